//! Sessions against real child processes driven through `/bin/sh`.

#![cfg(unix)]

use std::time::Duration;

use rust_converse::reply::Scripted;
use rust_converse::{
    Channel, DriverConfig, EndReason, ProcessChannel, ProcessConfig, ShutdownConfig, Speaker,
    run_session,
};

fn sh(script: &str) -> ProcessConfig {
    ProcessConfig::new("/bin/sh")
        .arg("-c")
        .arg(script)
        .shutdown(
            ShutdownConfig::default()
                .with_exit_wait(Duration::from_millis(200))
                .with_terminate_wait(Duration::from_millis(500)),
        )
}

fn config() -> DriverConfig {
    DriverConfig::new()
        .idle_timeout(Duration::from_secs(10))
        .final_grace(Duration::from_millis(100))
}

const CONSULTATION: &str = r#"
printf 'Patient: My head hurts.\n'
printf 'Doctor: '
read answer
printf 'Patient: You asked: %s\n' "$answer"
printf 'Doctor [50%%]: '
read answer
echo 'Case over'
read answer
"#;

#[tokio::test]
async fn full_consultation() {
    let mut channel = ProcessChannel::new(sh(CONSULTATION));
    let mut replies = Scripted::new(["Since when?", "Any fever?", "Goodbye."]);

    let outcome = run_session(&mut channel, &mut replies, &config())
        .await
        .unwrap();

    assert_eq!(outcome.end_reason, EndReason::EndSignal);
    assert_eq!(outcome.rounds, 2);
    let entries: Vec<(Speaker, &str)> = outcome.transcript.pairs();
    assert_eq!(
        entries,
        vec![
            (Speaker::Peer, "My head hurts."),
            (Speaker::Driver, "Since when?"),
            (Speaker::Peer, "You asked: Since when?"),
            (Speaker::Driver, "Any fever?"),
            (Speaker::Driver, "Goodbye."),
        ]
    );
    assert!(!channel.is_running());
    assert!(channel.exit_status().is_some());
}

#[tokio::test]
async fn stderr_lines_keep_their_place_in_the_transcript() {
    let mut channel = ProcessChannel::new(sh(
        "i=1; while [ $i -le 8 ]; do \
           printf 'Patient: o%s\\n' $i; printf 'Patient: e%s\\n' $i 1>&2; i=$((i+1)); \
         done",
    ));
    let mut replies = Scripted::new(["unused"]);

    let outcome = run_session(&mut channel, &mut replies, &config())
        .await
        .unwrap();

    assert_eq!(outcome.end_reason, EndReason::StreamClosed);
    let texts: Vec<&str> = outcome.transcript.iter().map(|u| u.text.as_str()).collect();
    let expected: Vec<String> = (1..=8)
        .flat_map(|i| [format!("o{i}"), format!("e{i}")])
        .collect();
    assert_eq!(texts, expected);
}

#[tokio::test]
async fn silent_process_times_out_and_is_stopped() {
    let mut channel = ProcessChannel::new(sh("printf 'Patient: hello\\n'; exec sleep 30"));
    let mut replies = Scripted::new(["unused"]);

    let outcome = run_session(
        &mut channel,
        &mut replies,
        &config().idle_timeout(Duration::from_millis(300)),
    )
    .await
    .unwrap();

    assert_eq!(outcome.end_reason, EndReason::Timeout);
    assert_eq!(outcome.transcript.count(Speaker::Peer), 1);
    assert!(channel.exit_status().is_some_and(|s| !s.success()));
}

#[tokio::test]
async fn missing_command_is_a_start_failure() {
    let mut channel = ProcessChannel::new(ProcessConfig::new("/nonexistent/clinic-sim"));
    let mut replies = Scripted::new(["unused"]);

    let err = run_session(&mut channel, &mut replies, &config())
        .await
        .unwrap_err();

    assert!(err.is_spawn());
    assert_eq!(replies.calls(), 0);
}

#[tokio::test]
async fn working_dir_and_env_are_applied() {
    let dir = std::env::temp_dir();
    let config = sh("printf 'Patient: %s %s\\n' \"$(pwd)\" \"$CLINIC_MODE\"")
        .working_dir(&dir)
        .env("CLINIC_MODE", "human");
    let mut channel = ProcessChannel::new(config);
    let mut replies = Scripted::new(["unused"]);

    let outcome = run_session(&mut channel, &mut replies, &DriverConfig::new())
        .await
        .unwrap();

    let text = &outcome.transcript.last().unwrap().text;
    assert!(text.ends_with(" human"));
    let reported = std::path::Path::new(text.trim_end_matches(" human"));
    assert_eq!(
        reported.canonicalize().unwrap(),
        dir.canonicalize().unwrap()
    );
}
