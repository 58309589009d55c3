use clap::Args;
use hourglass_quota::{Consumption, QuotaEngine, Usage};

use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct QuotaArgs {
    /// Feature name, as configured under `[limits]`.
    pub feature: String,
    /// User the quota applies to.
    pub user: String,
}

pub async fn run_peek(
    engine: &QuotaEngine,
    args: &QuotaArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let usage = engine.peek(&args.feature, &args.user).await;
    print_usage(args, &usage, format)
}

pub async fn run_credit(
    engine: &QuotaEngine,
    args: &QuotaArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let usage = engine.credit(&args.feature, &args.user).await;
    print_usage(args, &usage, format)?;
    if usage.is_registered() && usage.current == hourglass_quota::UNKNOWN {
        eprintln!("Credit may not have been applied; the store did not answer.");
        std::process::exit(1);
    }
    Ok(())
}

/// Consume one unit. Exits with status 1 when the quota is exhausted.
pub async fn run_consume(
    engine: &QuotaEngine,
    args: &QuotaArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let outcome = engine.consume(&args.feature, &args.user).await;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => println!("{}", describe_consumption(args, &outcome)),
    }
    if !outcome.allowed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_usage(args: &QuotaArgs, usage: &Usage, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(usage)?),
        OutputFormat::Text => println!("{}", describe_usage(args, usage)),
    }
    Ok(())
}

fn describe_usage(args: &QuotaArgs, usage: &Usage) -> String {
    if !usage.is_registered() {
        return format!("Feature '{}' is not registered.", args.feature);
    }
    match usage.remaining() {
        Some(remaining) => format!(
            "{}/{}: {}/{} used, {remaining} remaining",
            args.feature, args.user, usage.current, usage.limit
        ),
        None => format!(
            "{}/{}: usage unknown, limit {}",
            args.feature, args.user, usage.limit
        ),
    }
}

fn describe_consumption(args: &QuotaArgs, outcome: &Consumption) -> String {
    if !outcome.is_registered() {
        return format!(
            "Feature '{}' is not registered; allowed without counting.",
            args.feature
        );
    }
    match (outcome.allowed, outcome.remaining()) {
        (true, Some(remaining)) => format!(
            "Allowed. {}/{}: {}/{} used, {remaining} remaining",
            args.feature, args.user, outcome.current, outcome.limit
        ),
        (true, None) => format!(
            "Allowed (store unavailable, not counted). Limit {}",
            outcome.limit
        ),
        (false, _) => format!(
            "Denied. {}/{} has used {}/{} today.",
            args.feature, args.user, outcome.current, outcome.limit
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> QuotaArgs {
        QuotaArgs {
            feature: "lattice".into(),
            user: "pj11993".into(),
        }
    }

    #[test]
    fn describes_known_usage() {
        let text = describe_usage(&args(), &Usage {
            current: 1,
            limit: 4,
        });
        assert_eq!(text, "lattice/pj11993: 1/4 used, 3 remaining");
    }

    #[test]
    fn describes_unknown_usage() {
        let text = describe_usage(&args(), &Usage::unknown(4));
        assert_eq!(text, "lattice/pj11993: usage unknown, limit 4");
    }

    #[test]
    fn describes_unregistered_feature() {
        assert_eq!(
            describe_usage(&args(), &Usage::UNREGISTERED),
            "Feature 'lattice' is not registered."
        );
        assert!(describe_consumption(&args(), &Consumption::UNREGISTERED).contains("not registered"));
    }

    #[test]
    fn describes_consumption_outcomes() {
        let allowed = Consumption {
            current: 2,
            limit: 4,
            allowed: true,
        };
        assert_eq!(
            describe_consumption(&args(), &allowed),
            "Allowed. lattice/pj11993: 2/4 used, 2 remaining"
        );

        let denied = Consumption {
            current: 4,
            limit: 4,
            allowed: false,
        };
        assert_eq!(
            describe_consumption(&args(), &denied),
            "Denied. lattice/pj11993 has used 4/4 today."
        );

        assert!(describe_consumption(&args(), &Consumption::fail_open(4)).contains("not counted"));
    }
}
