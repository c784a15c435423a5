//! Line-oriented terminal view over an [`AssessmentHandle`].

use std::fmt::Write as _;

use prep_core::model::Question;
use prep_core::time::format_countdown;
use prep_core::{CompletionReason, Phase};
use services::{AppServices, AssessmentHandle, Command, Notice, SessionSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(Command),
    /// Run the question set loaded with `--items`.
    UseSelected,
    Time,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let mut chars = line.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Input::Command(Command::Select(c.to_ascii_uppercase()));
        }
        if c == '?' {
            return Input::Help;
        }
    }

    match line.to_ascii_lowercase().as_str() {
        "" => Input::Empty,
        "start" => Input::Command(Command::StartDefault),
        "use" => Input::UseSelected,
        "next" | "finish" => Input::Command(Command::Commit),
        "prev" | "back" => Input::Command(Command::Retreat),
        "reset" => Input::Command(Command::Reset),
        "time" => Input::Time,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

fn help_text() -> &'static str {
    "Commands:\n  \
     start        fetch a question set and begin\n  \
     use          run the questions loaded with --items\n  \
     A, B, C ...  pick an option\n  \
     next         confirm and move on (finish on the last question)\n  \
     prev         go back one question\n  \
     time         show the time left\n  \
     reset        abandon the run\n  \
     quit         leave"
}

fn markdown(html: &str) -> String {
    html2md::parse_html(html).trim().to_string()
}

// Snapshot with the clock-driven fields and the notice blanked, so ticks
// alone don't redraw. Notices are printed on their own.
fn layout_key(snapshot: &SessionSnapshot) -> SessionSnapshot {
    let mut key = snapshot.clone();
    key.remaining_seconds = 0;
    key.remaining.clear();
    key.elapsed_seconds = None;
    key.notice = None;
    key.commands_handled = 0;
    key
}

/// The snapshot's notice, if it hasn't been shown yet.
///
/// A notice is new when it differs from the last one, or when it follows a
/// command handled since then (the same rejection twice is reported twice).
fn fresh_notice<'a>(
    snapshot: &'a SessionSnapshot,
    seen_commands: u64,
    last: Option<&Notice>,
) -> Option<&'a Notice> {
    snapshot
        .notice
        .as_ref()
        .filter(|notice| snapshot.commands_handled != seen_commands || last != Some(*notice))
}

fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::Loading => "Loading questions...".to_string(),
        Notice::NoQuestions => "No questions available right now.".to_string(),
        Notice::FetchFailed(err) => format!("Could not load questions: {err}"),
        Notice::Rejected(err) => format!("Not now: {err}"),
    }
}

/// Render the screen for `snapshot`; `selected` is the size of the `--items` set.
pub fn render(snapshot: &SessionSnapshot, selected: usize) -> String {
    let mut out = String::new();

    match snapshot.phase {
        Phase::Intro => {
            out.push_str("Timed assessment: 30 minutes. Type `start` to begin, `help` for commands.\n");
            if selected > 0 {
                let _ = writeln!(out, "Type `use` to run the {selected} selected items.");
            }
        }
        Phase::InProgress => render_question(snapshot, &mut out),
        Phase::Complete => render_summary(snapshot, &mut out),
    }
    out
}

fn render_question(snapshot: &SessionSnapshot, out: &mut String) {
    let _ = writeln!(
        out,
        "\nQuestion {} of {}   time left {}   answered {}",
        snapshot.position, snapshot.total, snapshot.remaining, snapshot.answered
    );
    let Some(question) = &snapshot.question else {
        return;
    };

    let _ = writeln!(out, "{}", question.header);
    if !question.reference.is_empty() {
        let _ = writeln!(out, "{}", question.reference);
    }
    let _ = writeln!(out, "\n{}\n", markdown(&question.stem));

    let committed = snapshot.answer.committed.as_deref();
    for option in &question.options {
        let marker = if snapshot.answer.selected == Some(option.label) {
            '>'
        } else if committed.is_some_and(|c| c.starts_with(option.label)) {
            '*'
        } else {
            ' '
        };
        let _ = writeln!(out, "{marker} {}. {}", option.label, markdown(&option.content));
    }

    if let Some(rationale) = question.rationale.as_deref().filter(|r| !r.trim().is_empty()) {
        let _ = writeln!(out, "\nRationale:\n{}", markdown(rationale));
    }

    let _ = write!(out, "\n[letter] pick  ");
    if snapshot.can_commit {
        let _ = write!(out, "[next] {}  ", snapshot.commit_label.to_ascii_lowercase());
    }
    if snapshot.can_retreat {
        let _ = write!(out, "[prev] back  ");
    }
    out.push_str("[time] [reset] [quit]\n");
}

fn render_summary(snapshot: &SessionSnapshot, out: &mut String) {
    out.push_str("\nAssessment complete.\n");
    if let Some(score) = &snapshot.score {
        let _ = writeln!(
            out,
            "Score: {}/{} ({}%)",
            score.correct, score.total, score.percentage
        );
    }
    match snapshot.completion_reason {
        Some(CompletionReason::TimeExpired) => out.push_str("Time ran out.\n"),
        Some(CompletionReason::Finished) => out.push_str("Finished before time.\n"),
        None => {}
    }
    if let Some(secs) = snapshot.elapsed_seconds {
        let secs = u32::try_from(secs.max(0)).unwrap_or(u32::MAX);
        let _ = writeln!(out, "Time taken: {}", format_countdown(secs));
    }
}

/// Drive one assessment from stdin until it completes or the learner quits.
///
/// `preselected` starts right away when non-empty and stays available from
/// the intro through `use`.
pub async fn run_quiz(
    services: &AppServices,
    preselected: Vec<Question>,
) -> Result<(), Box<dyn std::error::Error>> {
    let handle = services
        .assessment_runner()
        .with_preselected(preselected.clone())
        .spawn();

    let result = drive(&handle, &preselected).await;
    handle.shutdown().await;
    result
}

fn show(snapshot: &SessionSnapshot, selected: usize) {
    print!("{}", render(snapshot, selected));
}

async fn drive(
    handle: &AssessmentHandle,
    preselected: &[Question],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut snapshots = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let first = snapshots.borrow_and_update().clone();
    show(&first, preselected.len());
    if let Some(notice) = &first.notice {
        println!("{}", render_notice(notice));
    }
    let mut shown = layout_key(&first);
    let mut seen_commands = first.commands_handled;
    let mut last_notice = first.notice;

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let key = layout_key(&snapshot);
                if key != shown || snapshot.is_complete() {
                    show(&snapshot, preselected.len());
                    shown = key;
                }
                if let Some(notice) = fresh_notice(&snapshot, seen_commands, last_notice.as_ref()) {
                    println!("{}", render_notice(notice));
                }
                seen_commands = snapshot.commands_handled;
                last_notice = snapshot.notice.clone();
                if snapshot.is_complete() {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_input(&line) {
                    Input::Command(command) => handle.send(command).await?,
                    Input::UseSelected if preselected.is_empty() => {
                        println!("no selected items, pass --items <file.json>");
                    }
                    Input::UseSelected if handle.snapshot().phase == Phase::InProgress => {
                        println!("finish or `reset` the current run first");
                    }
                    Input::UseSelected => {
                        handle
                            .send(Command::StartPreselected(preselected.to_vec()))
                            .await?;
                    }
                    Input::Time => println!("time left {}", handle.snapshot().remaining),
                    Input::Help => println!("{}", help_text()),
                    Input::Quit => break,
                    Input::Empty => {}
                    Input::Unknown(word) => {
                        println!("unknown command `{word}`, type `help` for the list");
                    }
                }
            }
        }
    }
    Ok(())
}
