use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use dotenvy::dotenv;
use schoolhub_cli::admin::create_system_admin;
use schoolhub_cli::seeder::{self, PerSchool, SeedConfig};
use schoolhub_models::users::NewAccount;

#[derive(Parser)]
#[command(name = "schoolhub-cli")]
#[command(about = "SchoolHub CLI - administrative tools for SchoolHub", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a system administrator account
    CreateSysadmin {
        #[arg(short = 'f', long)]
        first_name: Option<String>,

        #[arg(short = 'l', long)]
        last_name: Option<String>,

        #[arg(short = 'e', long)]
        email: Option<String>,

        /// Prompted for (with confirmation) when omitted
        #[arg(short = 'p', long)]
        password: Option<String>,
    },
    /// Seed fake schools, departments, semesters, teachers, students, courses and enrollments
    Seed {
        #[arg(short = 's', long, default_value = "3")]
        schools: usize,

        #[arg(long, default_value = "4")]
        departments: usize,

        #[arg(long, default_value = "8")]
        teachers: usize,

        #[arg(long, default_value = "120")]
        students: usize,

        #[arg(long, default_value = "3")]
        courses_per_department: usize,

        #[arg(long, default_value = "4")]
        enrollments_per_student: usize,
    },
    /// Remove everything created by `seed`
    ClearSeed,
}

fn prompt(label: &str) -> Result<String, dialoguer::Error> {
    Input::new().with_prompt(label).interact_text()
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let cli = Cli::parse();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("❌ DATABASE_URL must be set");
        std::process::exit(1);
    };

    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("❌ Failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::CreateSysadmin {
            first_name,
            last_name,
            email,
            password,
        } => handle_create_sysadmin(&pool, first_name, last_name, email, password).await,
        Commands::Seed {
            schools,
            departments,
            teachers,
            students,
            courses_per_department,
            enrollments_per_student,
        } => {
            let config = SeedConfig::new(schools).with_per_school(PerSchool {
                departments,
                teachers,
                students,
                courses_per_department,
                enrollments_per_student,
            });
            seeder::seed_all(&pool, config).await
        }
        Commands::ClearSeed => seeder::clear_all(&pool).await.map(|_| ()),
    };

    if let Err(e) = result {
        eprintln!("\n❌ {e}");
        std::process::exit(1);
    }
}

async fn handle_create_sysadmin(
    pool: &sqlx::PgPool,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> schoolhub_cli::CliResult<()> {
    let first_name = match first_name {
        Some(v) => v,
        None => prompt("First name")?,
    };
    let last_name = match last_name {
        Some(v) => v,
        None => prompt("Last name")?,
    };
    let email = match email {
        Some(v) => v,
        None => prompt("Email address")?,
    };
    let password = match password {
        Some(v) => v,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()?,
    };

    let account = NewAccount {
        first_name,
        last_name,
        email,
        password,
        phone: None,
    };
    let name = format!("{} {}", account.first_name, account.last_name);
    let email = account.email.clone();

    let id = create_system_admin(pool, account).await?;
    println!("\n✅ System admin created");
    println!("   ID: {id}");
    println!("   Email: {email}");
    println!("   Name: {name}");
    Ok(())
}
