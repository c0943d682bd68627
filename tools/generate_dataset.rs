//! Synthetic Account Dataset Generator
//!
//! Writes a CSV of debtor accounts for training demos and tests.
//!
//! Usage: generate_dataset [output] [count] [seed]

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use delinquency_risk::{config::LoggingConfig, logging, AccountRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::info;

/// Seeded account generator
struct AccountGenerator {
    rng: StdRng,
    today: NaiveDate,
}

impl AccountGenerator {
    fn new(seed: u64, today: NaiveDate) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            today,
        }
    }

    /// Mostly current accounts with a long tail of overdue months
    fn months_overdue(&mut self) -> u32 {
        match self.rng.gen_range(0..100) {
            0..=44 => 0,
            45..=64 => 1,
            65..=79 => 2,
            80..=89 => 3,
            90..=95 => self.rng.gen_range(4..=6),
            _ => self.rng.gen_range(7..=12),
        }
    }

    fn generate(&mut self) -> AccountRecord {
        let months = self.months_overdue();
        let original: f64 = self.rng.gen_range(500.0..20_000.0);

        // Overdue debts tend to keep more of the original balance
        let paid_share = if months == 0 {
            self.rng.gen_range(0.0..1.0)
        } else {
            self.rng.gen_range(0.0..0.8) / months as f64
        };
        let current = (original * (1.0 - paid_share) * 100.0).round() / 100.0;

        let days_late = if months == 0 {
            // Not yet due, or due within the last few days
            -(self.rng.gen_range(0..60) as i64)
        } else {
            months as i64 * 30 + self.rng.gen_range(0..30)
        };
        let due_date = if days_late >= 0 {
            self.today - Days::new(days_late as u64)
        } else {
            self.today + Days::new(days_late.unsigned_abs())
        };

        AccountRecord::new((original * 100.0).round() / 100.0, current, due_date, months)
    }
}

fn main() -> Result<()> {
    logging::init(&LoggingConfig::default(), "warn,generate_dataset=info")?;

    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("data/deudas.csv");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(1000);
    let seed: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(42);

    info!(output = %output, count, seed, "Generating synthetic accounts");

    if let Some(parent) = Path::new(output).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut writer =
        csv::Writer::from_path(output).with_context(|| format!("Failed to create {output}"))?;

    let mut generator = AccountGenerator::new(seed, Utc::now().date_naive());
    let mut delinquent = 0usize;
    for i in 0..count {
        let record = generator.generate();
        if record.is_delinquent() {
            delinquent += 1;
        }
        writer.serialize(&record)?;

        if (i + 1) % 1000 == 0 {
            info!("Generated {}/{} accounts", i + 1, count);
        }
    }
    writer.flush()?;

    info!(
        count,
        delinquent,
        "Completed! Wrote {} accounts to {}",
        count,
        output
    );
    Ok(())
}
