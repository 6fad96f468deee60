use anyhow::anyhow;
use chrono::NaiveTime;
use schoolhub_core::AppError;
use schoolhub_db::PgPool;
use schoolhub_models::courses::Course;
use schoolhub_models::ids::{ScheduleId, SchoolId, TeacherId};
use sqlx::FromRow;
use tracing::{info, instrument};

use super::model::{
    CreateScheduleDto, SCHEDULE_COLUMNS, Schedule, ScheduleFilterParams, UpdateScheduleDto,
    overlaps,
};

#[derive(Debug, Clone, FromRow)]
struct DaySlot {
    id: ScheduleId,
    start_time: NaiveTime,
    end_time: NaiveTime,
    room: Option<String>,
    teacher_id: Option<TeacherId>,
}

/// A slot being placed on a day.
#[derive(Debug, Clone)]
struct Placement<'a> {
    replacing: Option<ScheduleId>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    room: Option<&'a str>,
    teacher_id: Option<TeacherId>,
}

/// Why `placement` cannot go on a day already holding `slots`.
fn find_clash(slots: &[DaySlot], placement: &Placement<'_>) -> Option<&'static str> {
    slots
        .iter()
        .filter(|slot| Some(slot.id) != placement.replacing)
        .filter(|slot| {
            overlaps(
                slot.start_time,
                slot.end_time,
                placement.start_time,
                placement.end_time,
            )
        })
        .find_map(|slot| {
            let same_room = match (slot.room.as_deref(), placement.room) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            };
            if same_room {
                return Some("Room is already booked at this time");
            }
            if slot.teacher_id.is_some() && slot.teacher_id == placement.teacher_id {
                return Some("Teacher already has a class at this time");
            }
            None
        })
}

pub struct ScheduleService;

impl ScheduleService {
    async fn ensure_free(
        db: &PgPool,
        school_id: SchoolId,
        day_of_week: i16,
        placement: &Placement<'_>,
    ) -> Result<(), AppError> {
        let slots = sqlx::query_as::<_, DaySlot>(
            r#"SELECT s.id, s.start_time, s.end_time, s.room, c.teacher_id
               FROM schedules s
               JOIN courses c ON c.id = s.course_id
               WHERE s.school_id = $1 AND s.day_of_week = $2
                 AND s.is_deleted = FALSE AND c.is_deleted = FALSE"#,
        )
        .bind(school_id)
        .bind(day_of_week)
        .fetch_all(db)
        .await?;

        match find_clash(&slots, placement) {
            Some(reason) => Err(AppError::bad_request(anyhow!(reason))),
            None => Ok(()),
        }
    }

    #[instrument(skip(db, course, dto), fields(course.id = %course.id, day = dto.day_of_week))]
    pub async fn create(
        db: &PgPool,
        course: &Course,
        dto: CreateScheduleDto,
    ) -> Result<Schedule, AppError> {
        let room = dto.room.as_deref().map(str::trim);
        Self::ensure_free(
            db,
            course.school_id,
            dto.day_of_week,
            &Placement {
                replacing: None,
                start_time: dto.start_time,
                end_time: dto.end_time,
                room,
                teacher_id: course.teacher_id,
            },
        )
        .await?;

        let schedule = sqlx::query_as::<_, Schedule>(&format!(
            r#"INSERT INTO schedules (school_id, course_id, day_of_week, start_time, end_time, room)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {SCHEDULE_COLUMNS}"#
        ))
        .bind(course.school_id)
        .bind(course.id)
        .bind(dto.day_of_week)
        .bind(dto.start_time)
        .bind(dto.end_time)
        .bind(room)
        .fetch_one(db)
        .await?;

        info!(schedule.id = %schedule.id, "Schedule slot created");
        Ok(schedule)
    }

    #[instrument(skip(db))]
    pub async fn list(
        db: &PgPool,
        scope: Option<SchoolId>,
        filters: ScheduleFilterParams,
    ) -> Result<Vec<Schedule>, AppError> {
        let schedules = sqlx::query_as::<_, Schedule>(
            r#"SELECT s.id, s.school_id, s.course_id, s.day_of_week, s.start_time, s.end_time,
                      s.room, s.created_at, s.updated_at
               FROM schedules s
               JOIN courses c ON c.id = s.course_id
               WHERE s.is_deleted = FALSE AND c.is_deleted = FALSE
                 AND ($1::uuid IS NULL OR s.school_id = $1)
                 AND ($2::uuid IS NULL OR s.course_id = $2)
                 AND ($3::uuid IS NULL OR c.teacher_id = $3)
                 AND ($4::smallint IS NULL OR s.day_of_week = $4)
               ORDER BY s.day_of_week, s.start_time"#,
        )
        .bind(scope)
        .bind(filters.course_id)
        .bind(filters.teacher_id)
        .bind(filters.day_of_week)
        .fetch_all(db)
        .await?;
        Ok(schedules)
    }

    #[instrument(skip(db))]
    pub async fn get(
        db: &PgPool,
        scope: Option<SchoolId>,
        id: ScheduleId,
    ) -> Result<Schedule, AppError> {
        sqlx::query_as::<_, Schedule>(&format!(
            r#"SELECT {SCHEDULE_COLUMNS} FROM schedules
               WHERE id = $1 AND is_deleted = FALSE AND ($2::uuid IS NULL OR school_id = $2)"#
        ))
        .bind(id)
        .bind(scope)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Schedule not found")))
    }

    /// Partial update; the merged slot is checked again for clashes.
    #[instrument(skip(db, existing, dto), fields(schedule.id = %existing.id))]
    pub async fn update(
        db: &PgPool,
        existing: &Schedule,
        teacher_id: Option<TeacherId>,
        dto: UpdateScheduleDto,
    ) -> Result<Schedule, AppError> {
        let day_of_week = dto.day_of_week.unwrap_or(existing.day_of_week);
        let start_time = dto.start_time.unwrap_or(existing.start_time);
        let end_time = dto.end_time.unwrap_or(existing.end_time);
        let room = dto
            .room
            .as_deref()
            .map(str::trim)
            .or(existing.room.as_deref());

        if start_time >= end_time {
            return Err(AppError::bad_request(anyhow!(
                "start_time must be before end_time"
            )));
        }

        Self::ensure_free(
            db,
            existing.school_id,
            day_of_week,
            &Placement {
                replacing: Some(existing.id),
                start_time,
                end_time,
                room,
                teacher_id,
            },
        )
        .await?;

        sqlx::query_as::<_, Schedule>(&format!(
            r#"UPDATE schedules
               SET day_of_week = $2, start_time = $3, end_time = $4, room = $5, updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE
               RETURNING {SCHEDULE_COLUMNS}"#
        ))
        .bind(existing.id)
        .bind(day_of_week)
        .bind(start_time)
        .bind(end_time)
        .bind(room)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow!("Schedule not found")))
    }

    #[instrument(skip(db))]
    pub async fn delete(db: &PgPool, id: ScheduleId) -> Result<(), AppError> {
        sqlx::query(
            r#"UPDATE schedules SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
               WHERE id = $1 AND is_deleted = FALSE"#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn slot(start: u32, end: u32, room: Option<&str>, teacher: Option<TeacherId>) -> DaySlot {
        DaySlot {
            id: ScheduleId::new(),
            start_time: t(start),
            end_time: t(end),
            room: room.map(str::to_string),
            teacher_id: teacher,
        }
    }

    #[test]
    fn test_same_room_overlap_clashes() {
        let slots = vec![slot(9, 11, Some("B12"), None)];
        let placement = Placement {
            replacing: None,
            start_time: t(10),
            end_time: t(12),
            room: Some("b12"),
            teacher_id: None,
        };
        assert_eq!(
            find_clash(&slots, &placement),
            Some("Room is already booked at this time")
        );
    }

    #[test]
    fn test_same_teacher_overlap_clashes() {
        let teacher = TeacherId::new();
        let slots = vec![slot(9, 11, Some("A1"), Some(teacher))];
        let placement = Placement {
            replacing: None,
            start_time: t(10),
            end_time: t(12),
            room: Some("A2"),
            teacher_id: Some(teacher),
        };
        assert_eq!(
            find_clash(&slots, &placement),
            Some("Teacher already has a class at this time")
        );
    }

    #[test]
    fn test_adjacent_or_unrelated_slots_are_free() {
        let slots = vec![slot(9, 10, Some("A1"), Some(TeacherId::new()))];
        let adjacent = Placement {
            replacing: None,
            start_time: t(10),
            end_time: t(11),
            room: Some("A1"),
            teacher_id: None,
        };
        assert!(find_clash(&slots, &adjacent).is_none());

        let elsewhere = Placement {
            start_time: t(9),
            room: Some("C3"),
            ..adjacent
        };
        assert!(find_clash(&slots, &elsewhere).is_none());
    }

    #[test]
    fn test_slot_does_not_clash_with_itself() {
        let existing = slot(9, 10, Some("A1"), None);
        let placement = Placement {
            replacing: Some(existing.id),
            start_time: t(9),
            end_time: t(10),
            room: Some("A1"),
            teacher_id: None,
        };
        assert!(find_clash(&[existing], &placement).is_none());
    }
}
