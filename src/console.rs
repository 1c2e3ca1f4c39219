//! Plain-text console presentation.
//!
//! Rendering lives in free functions that return `String`s; the
//! [`ConsolePresenter`] only moves those strings to a writer and reads lines
//! from an async reader.

use std::io::{self, Write};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::models::{Category, FinishStatus, Rubric, Session, StageDefinition, StageKind, STAGES};
use crate::orchestrator::{PendingNote, Presenter};

const BELL: &str = "\x07";
/// Seconds before the end of a countdown at which the bell rings.
const WARNING_AT: u64 = 5;
const PERCENT_PER_POINT: f64 = 33.3;

pub struct ConsolePresenter<R, W> {
    input: R,
    output: W,
    countdown: bool,
    tick: Duration,
}

impl ConsolePresenter<tokio::io::BufReader<tokio::io::Stdin>, io::Stdout> {
    pub fn stdio(countdown: bool) -> Self {
        Self::new(
            tokio::io::BufReader::new(tokio::io::stdin()),
            io::stdout(),
            countdown,
        )
    }
}

impl<R, W> ConsolePresenter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    pub fn new(input: R, output: W, countdown: bool) -> Self {
        Self {
            input,
            output,
            countdown,
            tick: Duration::from_secs(1),
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn print(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)?;
        self.output.flush()
    }

    async fn run_countdown(&mut self, seconds: u64) -> io::Result<()> {
        for remaining in (1..=seconds).rev() {
            let bell = if remaining == WARNING_AT { BELL } else { "" };
            write!(self.output, "\r  {}{:>3}s ", bell, remaining)?;
            self.output.flush()?;
            tokio::time::sleep(self.tick).await;
        }
        write!(self.output, "\r        \r")?;
        self.output.flush()
    }
}

#[async_trait]
impl<R, W> Presenter for ConsolePresenter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    async fn session_started(&mut self, session: &Session, resumed: bool) -> io::Result<()> {
        let line = if resumed {
            format!(
                "Resuming paused session {} (target {})\n",
                session.id, session.target_id
            )
        } else {
            format!(
                "New session {} created  •  target {}\n",
                session.id, session.target_id
            )
        };
        self.print(&render_splash())?;
        self.print(&line)
    }

    async fn show_stage(
        &mut self,
        stage: &StageDefinition,
        position: usize,
        total: usize,
    ) -> io::Result<()> {
        self.print(&render_stage(stage, position, total))
    }

    async fn read_entry(&mut self, stage: &StageDefinition) -> io::Result<Option<String>> {
        let label = if stage.is_probe() { "Answer" } else { "Your entry" };
        write!(self.output, "{}: ", label)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    async fn show_help(&mut self, stage: &StageDefinition) -> io::Result<()> {
        self.print(&format!("  tip: {}", stage.help))
    }

    async fn stage_recorded(
        &mut self,
        stage: &StageDefinition,
        _note: &PendingNote,
        skipped: bool,
    ) -> io::Result<()> {
        if self.countdown && !skipped && !stage.is_probe() {
            self.run_countdown(stage.duration_secs).await?;
        }
        Ok(())
    }

    async fn scoring_started(&mut self, session_id: i64, status: FinishStatus) -> io::Result<()> {
        let line = match status {
            FinishStatus::Scoring => format!(
                "\nLocking notes for session {} and describing the target…",
                session_id
            ),
            FinishStatus::AlreadyScoring => {
                format!("\nSession {} is already being scored, waiting…", session_id)
            }
            FinishStatus::AlreadyScored => format!("\nSession {} was already scored.", session_id),
        };
        self.print(&line)
    }

    async fn cancelled(&mut self, session: &Session) -> io::Result<()> {
        self.print(&format!(
            "Session cancelled. {} note(s) kept on session {}; run again to resume.",
            session.notes.len(),
            session.id
        ))
    }

    async fn show_result(&mut self, session: &Session) -> io::Result<()> {
        self.print(&render_debrief(session))
    }
}

// ============================================================
// Rendering
// ============================================================

pub fn render_splash() -> String {
    [
        "Guided Session",
        "  • You will complete 6 short stages (about 5 minutes)",
        "  • Have pen and paper ready for sketches",
        "  • At any prompt you may type:",
        "      skip   → jump to the next stage",
        "      help   → a short tip for this stage",
        "      cancel → stop and keep your progress",
        "",
    ]
    .join("\n")
}

pub fn render_stage(stage: &StageDefinition, position: usize, total: usize) -> String {
    let mut out = format!("\n── {} ({}/{}) ──\n", stage.title, position, total);
    if let StageKind::Probe { question } = stage.kind {
        out.push_str(question);
        out.push('\n');
    }
    out.push_str(stage.prompt);
    out.push_str(&format!("\n  Example →  {}", stage.example));
    out
}

/// Score as a percentage of the nominal 3-point scale, one decimal, capped.
pub fn accuracy_percent(score: f64) -> f64 {
    ((score * PERCENT_PER_POINT * 10.0).round() / 10.0).min(100.0)
}

pub fn assessment(percent: f64) -> &'static str {
    if percent > 70.0 {
        "excellent"
    } else if percent > 50.0 {
        "good"
    } else if percent > 30.0 {
        "promising"
    } else {
        "developing"
    }
}

pub fn coach_tip(rubric: &Rubric) -> &'static str {
    if rubric.sensory >= 2 {
        "Great sensory detail! Next time linger on colours before moving to functions."
    } else {
        "Try pausing longer in Stage 2; literal adjectives beat guesses."
    }
}

pub fn render_debrief(session: &Session) -> String {
    let rubric = session.rubric.unwrap_or_default();
    let percent = accuracy_percent(session.total_score);

    let mut out = String::from("\nAccuracy Breakdown\n");
    out.push_str(&format!("  {:<10} {:>8}\n", "Category", "Score /3"));
    for category in Category::ALL {
        out.push_str(&format!(
            "  {:<10} {:>8}\n",
            capitalize(category.as_str()),
            rubric.get(category)
        ));
    }
    out.push_str(&format!(
        "\nOverall Accuracy →  {:.2}  /  3   ({:.1}%, {})\n",
        session.total_score,
        percent,
        assessment(percent)
    ));
    out.push_str(&format!("Coach Tip: {}", coach_tip(&rubric)));
    out
}

/// Summary of a stored session for `rv show`.
pub fn render_session(session: &Session) -> String {
    let mut out = format!("Session {} (target {})\n", session.id, session.target_id);
    if session.is_scored() {
        out.push_str(&render_debrief(session));
        out.push('\n');
    } else if let Some(since) = session.scoring_claimed_at {
        out.push_str(&format!(
            "Not scored yet (scoring since {}).\n",
            since.format("%Y-%m-%d %H:%M:%S")
        ));
    } else {
        out.push_str(&format!(
            "Not scored yet ({}).\n",
            session.scoring_status.as_str()
        ));
    }

    out.push_str("\nNotes:\n");
    let log = session.stage_log();
    if log.is_empty() {
        out.push_str("  No notes recorded\n");
    }
    for (stage, text) in log {
        for line in text.lines() {
            out.push_str(&format!("  [{}] {}\n", stage, line));
        }
    }
    out
}

/// One line per session for `rv sessions`.
pub fn render_session_row(session: &Session) -> String {
    let score = if session.is_scored() {
        format!("{:.3}", session.total_score)
    } else {
        "-".to_string()
    };
    format!(
        "{:>5}  {:<10}  {:<8}  {:>6}  {}",
        session.id,
        session.target_id,
        session.scoring_status.as_str(),
        score,
        session.created_at.format("%Y-%m-%d %H:%M")
    )
}

/// Printable reference card of the stage plan.
pub fn render_cheatsheet() -> String {
    let mut out = String::from("Stage cheatsheet\n");
    let mut last_ordinal = 0;
    for stage in STAGES {
        if let StageKind::Probe { question } = stage.kind {
            if stage.ordinal != last_ordinal {
                out.push_str(&format!("\n{} ({}s each)\n", stage.title, stage.duration_secs));
            }
            out.push_str(&format!("  • {}\n", question));
        } else {
            out.push_str(&format!(
                "\n{} ({}s)\n  {}\n  e.g. {}\n",
                stage.title,
                stage.duration_secs,
                stage.prompt.replace('\n', "\n  "),
                stage.example
            ));
        }
        last_ordinal = stage.ordinal;
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
