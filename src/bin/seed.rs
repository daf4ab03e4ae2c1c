//! Inserts a handful of sample users. Safe to rerun: a sample whose
//! `external_id` or email is already taken is skipped.

use userbase::{config::DatabaseConfig, db};

struct Sample {
    external_id: &'static str,
    email: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    is_active: bool,
}

// No conflict target: a taken email skips the row just like a taken subject.
const INSERT_SAMPLE: &str = r#"
    INSERT INTO users (external_id, email, first_name, last_name, profile_picture, is_active)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT DO NOTHING
"#;

const PLACEHOLDER_PICTURE: &str = "https://via.placeholder.com/150";

const SAMPLES: &[Sample] = &[
    Sample {
        external_id: "auth0|507f1f77bcf86cd799439011",
        email: "john.doe@example.com",
        first_name: "John",
        last_name: "Doe",
        is_active: true,
    },
    Sample {
        external_id: "auth0|507f1f77bcf86cd799439012",
        email: "jane.smith@example.com",
        first_name: "Jane",
        last_name: "Smith",
        is_active: true,
    },
    Sample {
        external_id: "auth0|507f1f77bcf86cd799439013",
        email: "bob.johnson@example.com",
        first_name: "Bob",
        last_name: "Johnson",
        is_active: false,
    },
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "seed=info".into()))
        .init();

    let config = DatabaseConfig::from_env()?;
    let pool = db::connect(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let mut inserted = 0;
    for s in SAMPLES {
        let res = sqlx::query(INSERT_SAMPLE)
            .bind(s.external_id)
            .bind(s.email)
            .bind(s.first_name)
            .bind(s.last_name)
            .bind(PLACEHOLDER_PICTURE)
            .bind(s.is_active)
            .execute(&pool)
            .await?;
        inserted += res.rows_affected();
    }

    tracing::info!(inserted, skipped = SAMPLES.len() as u64 - inserted, "seeding completed");
    Ok(())
}
