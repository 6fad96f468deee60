use axum::{Router, routing::get};

use crate::state::AppState;

use super::controller::{
    create_student, delete_student, get_my_profile, get_student, get_student_enrollments,
    get_student_gpa, get_student_grades, get_students, update_student,
};

pub fn init_students_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_students).post(create_student))
        .route("/me", get(get_my_profile))
        .route(
            "/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/{id}/gpa", get(get_student_gpa))
        .route("/{id}/enrollments", get(get_student_enrollments))
        .route("/{id}/grades", get(get_student_grades))
}
