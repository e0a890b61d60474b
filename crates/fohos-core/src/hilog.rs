//! hilog line classifier
//!
//! Decides which lines of a device's `hilog` output belong to the Flutter
//! application. Classification is stateful: untagged continuation lines (such
//! as the tail of a multi-line stack trace) follow the verdict of the line
//! before them, and a native fatal signal switches the classifier into a crash
//! mode that only surfaces the tombstone report until it is written out.
//!
//! The classifier is a pure state machine with no I/O, so it can be driven
//! directly by tests or by the log reader in `fohos-daemon`.

use regex::Regex;
use std::sync::LazyLock;

/// `MM-DD HH:MM:SS.mmm  pid  tid ` prefix shared by every hilog line
const HILOG_PREFIX: &str = r"^\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}\.\d{3}\s+\d+\s+\d+\s+";

/// Marker lines hilog prints between buffers
const BEGINNING_OF_LOG_MARKERS: &[&str] = &[
    "--------- beginning of system",
    "--------- beginning of main",
];

/// Generic hilog format: prefix, level, `domain/tag: `
static LOG_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{HILOG_PREFIX}[DIWEF]\s+[0-9A-Za-z]+/[^:]+:\s"))
        .expect("Invalid hilog format regex")
});

/// Tags and levels that are shown to the user
static ALLOWED_TAGS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Application output
        r"[DIWEF]\s+[0-9A-Za-z]+/(?i:flutter)[^:]*:\s",
        // Dart VM and VM service announcements
        r"[IE]\s+[0-9A-Za-z]+/DartVM[^:]*:\s",
        // Crash reporters
        r"[WEF]\s+[0-9A-Za-z]+/(?:CppCrash|JsCrash)[^:]*:\s",
        // Anything fatal
        r"F\s+[0-9A-Za-z]+/[^:]+:\s",
    ]
    .iter()
    .map(|pattern| {
        Regex::new(&format!("{HILOG_PREFIX}{pattern}")).expect("Invalid allowed tag regex")
    })
    .collect()
});

/// `F .../libc: Fatal signal 11 ...`
static FATAL_SIGNAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"{HILOG_PREFIX}F\s+[0-9A-Za-z]+/libc[^:]*:\s.*Fatal signal (\d+)"
    ))
    .expect("Invalid fatal signal regex")
});

/// `I .../DEBUG: <report line>`
static TOMBSTONE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{HILOG_PREFIX}[IF]\s+[0-9A-Za-z]+/DEBUG[^:]*:\s(.+)$"))
        .expect("Invalid tombstone regex")
});

static TOMBSTONE_TERMINATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Tombstone written to:\s").expect("Invalid tombstone terminator regex")
});

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Verdict for a single line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineVerdict {
    /// Surface this text to listeners
    Emit(String),
    /// Drop the line
    Suppress,
}

/// Classifier state that persists across lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    /// Regular filtering; remembers whether the previous line was shown
    Normal { accepted_last: bool },
    /// A fatal signal was seen; only tombstone lines are shown
    InCrash,
}

impl Default for ClassifierState {
    fn default() -> Self {
        ClassifierState::Normal {
            accepted_last: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classifier
// ─────────────────────────────────────────────────────────────────────────────

/// Line-by-line state machine over hilog output
#[derive(Debug, Default)]
pub struct HilogClassifier {
    state: ClassifierState,
}

impl HilogClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    /// Return to normal mode with no accepted line
    pub fn reset(&mut self) {
        self.state = ClassifierState::default();
    }

    /// Classify one line and advance the state machine
    pub fn classify(&mut self, line: &str) -> LineVerdict {
        let (next, verdict) = match self.state {
            ClassifierState::InCrash => in_crash(line),
            ClassifierState::Normal { accepted_last } => normal(line, accepted_last),
        };
        self.state = next;
        verdict
    }
}

fn normal(line: &str, accepted_last: bool) -> (ClassifierState, LineVerdict) {
    if LOG_FORMAT.is_match(line) {
        if FATAL_SIGNAL.is_match(line) {
            return (ClassifierState::InCrash, LineVerdict::Suppress);
        }

        if ALLOWED_TAGS.iter().any(|re| re.is_match(line)) {
            return (
                ClassifierState::Normal {
                    accepted_last: true,
                },
                LineVerdict::Emit(line.to_string()),
            );
        }

        return (
            ClassifierState::Normal {
                accepted_last: false,
            },
            LineVerdict::Suppress,
        );
    }

    if BEGINNING_OF_LOG_MARKERS.contains(&line.trim_end()) {
        return (
            ClassifierState::Normal {
                accepted_last: false,
            },
            LineVerdict::Suppress,
        );
    }

    // Continuation of a multi-line entry
    if accepted_last {
        (
            ClassifierState::Normal {
                accepted_last: true,
            },
            LineVerdict::Emit(line.to_string()),
        )
    } else {
        (
            ClassifierState::Normal {
                accepted_last: false,
            },
            LineVerdict::Suppress,
        )
    }
}

fn in_crash(line: &str) -> (ClassifierState, LineVerdict) {
    let Some(caps) = TOMBSTONE_LINE.captures(line) else {
        return (ClassifierState::InCrash, LineVerdict::Suppress);
    };

    let report = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let next = if TOMBSTONE_TERMINATOR.is_match(report) {
        ClassifierState::Normal {
            accepted_last: false,
        }
    } else {
        ClassifierState::InCrash
    };

    (next, LineVerdict::Emit(report.to_string()))
}

/// Whether a line has the generic hilog shape
pub fn is_hilog_line(line: &str) -> bool {
    LOG_FORMAT.is_match(line)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn line(level: char, tag: &str, msg: &str) -> String {
        format!("04-19 17:02:14.735  5394  5401 {level} C03900/{tag}: {msg}")
    }

    fn emitted(classifier: &mut HilogClassifier, lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .filter_map(|l| match classifier.classify(l) {
                LineVerdict::Emit(text) => Some(text),
                LineVerdict::Suppress => None,
            })
            .collect()
    }

    #[test]
    fn test_flutter_tag_emitted_unmodified() {
        let mut c = HilogClassifier::new();
        let l = line('I', "Flutter", "flutter: hello world");
        assert_eq!(c.classify(&l), LineVerdict::Emit(l.clone()));
        assert_eq!(
            c.state(),
            ClassifierState::Normal {
                accepted_last: true
            }
        );
    }

    #[test]
    fn test_flutter_tag_case_insensitive() {
        let mut c = HilogClassifier::new();
        let l = line('D', "flutter_engine", "surface created");
        assert_eq!(c.classify(&l), LineVerdict::Emit(l.clone()));
    }

    #[test]
    fn test_dart_vm_tag_emitted() {
        let mut c = HilogClassifier::new();
        let l = line(
            'I',
            "DartVM",
            "The Dart VM service is listening on http://127.0.0.1:41231/abc=/",
        );
        assert_eq!(c.classify(&l), LineVerdict::Emit(l.clone()));
    }

    #[test]
    fn test_crash_reporter_tags_emitted() {
        let mut c = HilogClassifier::new();
        let cpp = line('E', "CppCrash", "Process crashed");
        let js = line('W', "JsCrash", "Uncaught exception");
        assert_eq!(c.classify(&cpp), LineVerdict::Emit(cpp.clone()));
        assert_eq!(c.classify(&js), LineVerdict::Emit(js.clone()));
    }

    #[test]
    fn test_unrelated_tag_suppressed() {
        let mut c = HilogClassifier::new();
        assert_eq!(
            c.classify(&line('I', "AbilityManager", "ability foreground")),
            LineVerdict::Suppress
        );
        assert_eq!(
            c.state(),
            ClassifierState::Normal {
                accepted_last: false
            }
        );
    }

    #[test]
    fn test_continuation_follows_previous_verdict() {
        let mut c = HilogClassifier::new();
        let lines = vec![
            line('E', "Flutter", "Unhandled exception:"),
            "#0      main (package:app/main.dart:4:3)".to_string(),
            "#1      _runMain (dart:ui/hooks.dart:301:23)".to_string(),
            line('I', "WindowManager", "focus changed"),
            "    at something.else".to_string(),
        ];
        let out = emitted(&mut c, &lines);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1], "#0      main (package:app/main.dart:4:3)");
    }

    #[test]
    fn test_unformatted_line_without_accepted_predecessor_suppressed() {
        let mut c = HilogClassifier::new();
        assert_eq!(c.classify("random noise"), LineVerdict::Suppress);
    }

    #[test]
    fn test_beginning_markers_always_suppressed() {
        let mut c = HilogClassifier::new();
        c.classify(&line('I', "Flutter", "before"));
        assert_eq!(
            c.classify("--------- beginning of main"),
            LineVerdict::Suppress
        );
        // Marker resets the continuation heuristic
        assert_eq!(c.classify("dangling"), LineVerdict::Suppress);

        c.classify(&line('I', "Flutter", "again"));
        assert_eq!(
            c.classify("--------- beginning of system"),
            LineVerdict::Suppress
        );
    }

    #[test]
    fn test_fatal_crash_round_trip() {
        let mut c = HilogClassifier::new();
        let n = 3;
        let mut lines = vec![line('F', "libc", "Fatal signal 11 (SIGSEGV), code 1")];
        for i in 0..n {
            lines.push(line('F', "DEBUG", &format!("    #0{i} pc 0000{i} libapp.so")));
        }
        lines.push(line(
            'I',
            "DEBUG",
            "Tombstone written to: /data/log/faultlog/cppcrash-1",
        ));

        let out = emitted(&mut c, &lines);
        assert_eq!(out.len(), n + 1);
        assert!(out.iter().all(|l| !l.contains("DEBUG")));
        assert_eq!(out[0], "    #00 pc 00000 libapp.so");
        assert_eq!(
            out[n],
            "Tombstone written to: /data/log/faultlog/cppcrash-1"
        );
        assert!(matches!(c.state(), ClassifierState::Normal { .. }));
    }

    #[test]
    fn test_crash_mode_hides_non_tombstone_lines() {
        let mut c = HilogClassifier::new();
        c.classify(&line('F', "libc", "Fatal signal 6 (SIGABRT)"));
        assert_eq!(c.state(), ClassifierState::InCrash);
        assert_eq!(
            c.classify(&line('I', "Flutter", "still logging")),
            LineVerdict::Suppress
        );
        assert_eq!(c.classify("unformatted"), LineVerdict::Suppress);
        assert_eq!(c.state(), ClassifierState::InCrash);
    }

    #[test]
    fn test_reset_returns_to_normal() {
        let mut c = HilogClassifier::new();
        c.classify(&line('F', "libc", "Fatal signal 11"));
        c.reset();
        assert_eq!(c.state(), ClassifierState::default());
    }

    #[test]
    fn test_is_hilog_line() {
        assert!(is_hilog_line(&line('W', "Any", "x")));
        assert!(!is_hilog_line("W/Android(123): not hilog"));
    }
}
