//! Drive a scripted consultation running under `/bin/sh`.
//!
//! The shell script plays the peer: it speaks as the patient, prints doctor
//! prompts without a trailing newline, and reads one reply per prompt.
//!
//! Run with: `RUST_LOG=rust_converse=debug cargo run --example shell_dialogue`
//!
//! Set `CONVERSE_MAX_ROUNDS` or `CONVERSE_IDLE_TIMEOUT_SECS` to change the
//! session limits.

use rust_converse::prelude::*;
use tracing_subscriber::EnvFilter;

const PEER: &str = r#"
printf 'Loading scenario 0...\n'
printf 'Patient [0%%]: I have had a fever since Monday.\n'
printf 'Doctor [0%%]: '
read reply
printf 'Patient [33%%]: No cough, but my joints ache.\n'
printf 'Doctor [33%%]: '
read reply
printf 'Patient [66%%]: I was hiking last week.\n'
printf 'Question for patient: '
read reply
printf 'Scene 0, The diagnosis was CORRECT 100\n'
read reply
"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut channel = ProcessChannel::new(ProcessConfig::new("/bin/sh").args(["-c", PEER]));

    let mut questions = [
        "Any other symptoms?",
        "Have you travelled or been outdoors recently?",
        "Any tick bites you noticed?",
    ]
    .into_iter();
    let mut replies = rust_converse::reply::from_sync_fn(move |history: &Transcript| {
        Ok(questions.next().map_or_else(
            || format!("Final diagnosis after {} exchanges: Lyme disease.", history.len()),
            str::to_string,
        ))
    })
    .with_fallback(DEFAULT_FALLBACK);

    let outcome = run_session(&mut channel, &mut replies, &DriverConfig::from_env()).await?;

    println!("Session ended: {}", outcome.end_reason);
    println!("Rounds: {}", outcome.rounds);
    println!();
    print!("{}", outcome.transcript);
    println!();
    println!("{}", serde_json::to_string_pretty(&outcome.stats)?);
    Ok(())
}
