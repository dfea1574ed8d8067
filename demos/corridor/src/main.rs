//! corridor-demo — run one seeded episode of the corridor environment with
//! the default timing plan and print the per-interval rewards.

use anyhow::Result;

use dnl_env::Env;

// ── Episode parameters ────────────────────────────────────────────────────────

const INTERVAL: i64 = 5 * 60; // 5-minute control intervals
const NUM_INTERVALS: u32 = 12; // one simulated hour
const WARMUP: i64 = 900;
const SEED: u64 = 1831;

fn main() -> Result<()> {
    pretty_env_logger::init();

    println!("=== corridor demo — rust_dnl ===");
    println!(
        "Interval: {INTERVAL} s  |  Intervals: {NUM_INTERVALS}  |  Warmup: {WARMUP} s  |  Seed: {SEED}"
    );
    println!();

    // 1. Build the environment and warm the network up.
    let mut env = Env::new(INTERVAL, NUM_INTERVALS, WARMUP)?;
    env.reset(SEED)?;

    // 2. Roll the episode forward under the default timing plan.
    println!("{:<10} {:<14} {:<6}", "Interval", "Reward", "Done");
    println!("{}", "-".repeat(32));
    let mut total = 0.0;
    for k in 1..=NUM_INTERVALS {
        let (_state, reward, done) = env.step(None)?;
        total += reward;
        println!("{k:<10} {reward:<14.1} {done:<6}");
        if done {
            break;
        }
    }
    println!();
    println!("Episode reward: {total:.1}");

    Ok(())
}
