//! Test utilities for transport and build code
//!
//! Provides [`FakeProcessRunner`], a scripted [`ProcessRunner`] that records
//! every invocation and answers from a list of rules.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot, watch};

use crate::process::{ProcessCommand, ProcessRunner, RunOutput, SpawnedProcess};
use fohos_core::prelude::*;

struct Rule {
    /// Substring of the command line (arguments only) this rule answers
    needle: String,
    /// Responses consumed in order; the last one repeats
    responses: VecDeque<RunOutput>,
}

struct StreamRule {
    needle: String,
    lines: Vec<String>,
    hold_open: bool,
}

/// Scripted process runner.
///
/// Rules are matched in insertion order against the space-joined arguments
/// of each command. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeProcessRunner {
    rules: Mutex<Vec<Rule>>,
    streams: Mutex<Vec<StreamRule>>,
    calls: Mutex<Vec<ProcessCommand>>,
    spawn_calls: Mutex<Vec<ProcessCommand>>,
}

impl FakeProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every command containing `needle` with `output`
    pub fn respond(&self, needle: &str, output: RunOutput) -> &Self {
        self.respond_sequence(needle, vec![output])
    }

    /// Answer successive matching commands with `outputs`, repeating the last
    pub fn respond_sequence(&self, needle: &str, outputs: Vec<RunOutput>) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            responses: outputs.into(),
        });
        self
    }

    /// Spawned commands containing `needle` emit `lines` then exit
    pub fn stream(&self, needle: &str, lines: Vec<String>) -> &Self {
        self.push_stream(needle, lines, false)
    }

    /// Spawned commands containing `needle` emit `lines` and stay alive until killed
    pub fn stream_open(&self, needle: &str, lines: Vec<String>) -> &Self {
        self.push_stream(needle, lines, true)
    }

    fn push_stream(&self, needle: &str, lines: Vec<String>, hold_open: bool) -> &Self {
        self.streams.lock().unwrap().push(StreamRule {
            needle: needle.to_string(),
            lines,
            hold_open,
        });
        self
    }

    /// Every `run` invocation so far, as argument strings
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.args.join(" "))
            .collect()
    }

    /// Every `run` invocation so far, as full commands
    pub fn commands(&self) -> Vec<ProcessCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Every `spawn` invocation so far, as argument strings
    pub fn spawn_calls(&self) -> Vec<String> {
        self.spawn_calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.args.join(" "))
            .collect()
    }

    /// Number of recorded `run` calls whose arguments contain `needle`
    pub fn count(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }

    fn answer(&self, command: &ProcessCommand) -> RunOutput {
        let line = command.args.join(" ");
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if line.contains(&rule.needle) {
                return if rule.responses.len() > 1 {
                    rule.responses.pop_front().unwrap_or_default()
                } else {
                    rule.responses.front().cloned().unwrap_or_default()
                };
            }
        }
        RunOutput::ok("")
    }
}

impl ProcessRunner for FakeProcessRunner {
    async fn run(&self, command: &ProcessCommand) -> Result<RunOutput> {
        self.calls.lock().unwrap().push(command.clone());
        Ok(self.answer(command))
    }

    fn spawn(&self, command: &ProcessCommand) -> Result<SpawnedProcess> {
        self.spawn_calls.lock().unwrap().push(command.clone());

        let line = command.args.join(" ");
        let streams = self.streams.lock().unwrap();
        let rule = streams.iter().find(|r| line.contains(&r.needle));
        let (lines, hold_open) = rule
            .map(|r| (r.lines.clone(), r.hold_open))
            .unwrap_or_default();

        let (tx, rx) = mpsc::channel(lines.len() + 1);
        for l in lines {
            let _ = tx.try_send(l);
        }

        let (exit_tx, exit_rx) = watch::channel(!hold_open);
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        // Scripted lines stay buffered after a non-held process exits, like a pipe.
        if hold_open {
            tokio::spawn(async move {
                let _ = kill_rx.await;
                drop(tx);
                exit_tx.send_replace(true);
            });
        } else {
            drop(tx);
        }

        Ok(SpawnedProcess::new(rx, kill_tx, exit_rx, None))
    }
}

/// A hilog line in the device's format
pub fn hilog_line(level: char, tag: &str, message: &str) -> String {
    format!("04-19 17:02:14.735  5394  5401 {level} C03900/{tag}: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rules_match_in_order_and_record_calls() {
        let runner = FakeProcessRunner::new();
        runner
            .respond("list targets", RunOutput::ok("abc\n"))
            .respond("shell", RunOutput::failed(1, "boom"));

        let out = runner
            .run(&ProcessCommand::new("hdc").args(["list", "targets"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "abc\n");

        let out = runner
            .run(&ProcessCommand::new("hdc").args(["shell", "ls"]))
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(1));

        assert_eq!(runner.calls(), vec!["list targets", "shell ls"]);
        assert_eq!(runner.count("shell"), 1);
    }

    #[tokio::test]
    async fn test_sequence_repeats_last() {
        let runner = FakeProcessRunner::new();
        runner.respond_sequence(
            "install",
            vec![RunOutput::failed(1, "first"), RunOutput::ok("second")],
        );
        let cmd = ProcessCommand::new("hdc").arg("install");
        assert_eq!(runner.run(&cmd).await.unwrap().stderr, "first");
        assert_eq!(runner.run(&cmd).await.unwrap().stdout, "second");
        assert_eq!(runner.run(&cmd).await.unwrap().stdout, "second");
    }

    #[test]
    fn test_unmatched_commands_succeed_empty() {
        let runner = FakeProcessRunner::new();
        let out = tokio_test::block_on(runner.run(&ProcessCommand::new("hdc").arg("anything")))
            .unwrap();
        assert!(out.success());
        assert!(out.stdout.is_empty());
    }

    #[tokio::test]
    async fn test_stream_emits_lines_then_closes() {
        let runner = FakeProcessRunner::new();
        runner.stream("hilog", vec!["a".into(), "b".into()]);
        let mut process = runner
            .spawn(&ProcessCommand::new("hdc").args(["shell", "hilog"]))
            .unwrap();
        assert_eq!(process.lines.recv().await.as_deref(), Some("a"));
        assert_eq!(process.lines.recv().await.as_deref(), Some("b"));
        assert_eq!(process.lines.recv().await, None);
    }
}
