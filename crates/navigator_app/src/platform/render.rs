//! Incremental terminal rendering of the chat view model.
//!
//! Rows are append-only on screen: finished rows are printed once, and the
//! row receiving deltas is extended with whatever text arrived since the last
//! render.
use std::io::{self, Write};

use navigator_core::{ChatViewModel, MessageRowView, MessageStatus, Source, TicketRef};

const USER_PREFIX: &str = "you> ";
const MODEL_PREFIX: &str = "navigator> ";

pub struct TerminalRenderer<W: Write> {
    out: W,
    chat_id: Option<String>,
    /// Rows fully printed.
    rows_done: usize,
    /// Text already shown for the row being streamed.
    printed: String,
    row_started: bool,
    last_error: Option<String>,
    last_notice: Option<String>,
    last_focus: Option<usize>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            chat_id: None,
            rows_done: 0,
            printed: String::new(),
            row_started: false,
            last_error: None,
            last_notice: None,
            last_focus: None,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Prints a line that is not part of the chat, such as command help.
    pub fn note(&mut self, text: &str) -> io::Result<()> {
        self.break_line()?;
        writeln!(self.out, "{text}")?;
        self.out.flush()
    }

    pub fn render(&mut self, view: &ChatViewModel) -> io::Result<()> {
        if view.chat_id != self.chat_id || view.rows.len() < self.rows_done {
            self.reset(view)?;
        }

        while let Some(row) = view.rows.get(self.rows_done) {
            let last = self.rows_done + 1 == view.rows.len();
            if !self.render_row(row, last)? {
                break;
            }
        }

        if view.error != self.last_error {
            if let Some(error) = &view.error {
                self.break_line()?;
                writeln!(self.out, "error: {error}")?;
            }
            self.last_error = view.error.clone();
        }
        if view.notice != self.last_notice {
            if let Some(notice) = &view.notice {
                self.break_line()?;
                writeln!(self.out, "{notice}")?;
            }
            self.last_notice = view.notice.clone();
        }
        if view.focused != self.last_focus {
            if let Some(index) = view.focused {
                self.break_line()?;
                self.render_tickets(index, &view.tickets)?;
            }
            self.last_focus = view.focused;
        }
        self.out.flush()
    }

    fn reset(&mut self, view: &ChatViewModel) -> io::Result<()> {
        self.break_line()?;
        if view.chat_id.is_some() && view.chat_id != self.chat_id {
            writeln!(self.out, "== {} ==", view.chat_name)?;
        }
        self.chat_id = view.chat_id.clone();
        self.rows_done = 0;
        self.printed.clear();
        self.row_started = false;
        Ok(())
    }

    /// Returns whether the row is finished. Only the last row can still be
    /// streaming; older pending rows come from stored history.
    fn render_row(&mut self, row: &MessageRowView, last: bool) -> io::Result<bool> {
        if !self.row_started {
            let prefix = match row.source {
                Source::User => USER_PREFIX,
                Source::Model => MODEL_PREFIX,
            };
            write!(self.out, "{prefix}")?;
            self.row_started = true;
        }

        if last && row.status == MessageStatus::Pending {
            if let Some(fresh) = row.content.strip_prefix(self.printed.as_str()) {
                write!(self.out, "{fresh}")?;
                self.printed.push_str(fresh);
            }
            return Ok(false);
        }

        // Structured replies stream as raw JSON; the parsed answer replaces it.
        match row.content.strip_prefix(self.printed.as_str()) {
            Some(rest) => write!(self.out, "{rest}")?,
            None => write!(self.out, "\n{MODEL_PREFIX}{}", row.content)?,
        }
        match row.status {
            MessageStatus::Aborted => write!(self.out, " [aborted]")?,
            MessageStatus::Failed => write!(self.out, " [failed]")?,
            MessageStatus::Pending => write!(self.out, " [pending]")?,
            _ => {}
        }
        if let Some(elapsed_ms) = row.elapsed_ms {
            write!(self.out, " ({} sec)", format_seconds(elapsed_ms))?;
        }
        if row.reference_count > 0 {
            write!(
                self.out,
                " [{} tickets, /refs {}]",
                row.reference_count,
                row.index + 1
            )?;
        }
        writeln!(self.out)?;

        self.rows_done += 1;
        self.printed.clear();
        self.row_started = false;
        Ok(true)
    }

    fn render_tickets(&mut self, index: usize, tickets: &[TicketRef]) -> io::Result<()> {
        if tickets.is_empty() {
            return Ok(());
        }
        writeln!(self.out, "tickets cited by message {}:", index + 1)?;
        for ticket in tickets {
            writeln!(self.out, "{}", format_ticket(ticket))?;
        }
        Ok(())
    }

    /// Ends a half-printed streaming line before printing a banner.
    fn break_line(&mut self) -> io::Result<()> {
        if self.row_started {
            writeln!(self.out)?;
            self.row_started = false;
            self.printed.clear();
        }
        Ok(())
    }
}

pub fn format_ticket(ticket: &TicketRef) -> String {
    format!(
        "  #{} [{} / {}] {}\n      {}",
        ticket.accident_id, ticket.event_type, ticket.industry_type, ticket.title, ticket.url
    )
}

fn format_seconds(elapsed_ms: u64) -> String {
    format!("{}.{}", elapsed_ms / 1000, (elapsed_ms % 1000) / 100)
}
