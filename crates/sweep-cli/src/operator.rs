use colored::*;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use sweep_core::aggregate::ProgramGroup;
use sweep_core::plan::{parse_program_choice, parse_tier_choice};
use sweep_core::{Importance, Operator, ProgramGroups, SelectionChoices, SelectionSet};

const RULE: &str = "--------------------------------------------------";

/// Interactive operator reading answers line by line.
pub struct PromptOperator<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl PromptOperator<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    fn ask(&self, prompt: &str) -> io::Result<String> {
        {
            let mut out = self.output.borrow_mut();
            write!(out, "{}", prompt)?;
            out.flush()?;
        }
        let mut line = String::new();
        if self.input.borrow_mut().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            ));
        }
        Ok(line)
    }

    fn say(&self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.output.borrow_mut(), "{}", text.as_ref())
    }

    fn print_summary(&self, groups: &ProgramGroups) -> io::Result<()> {
        self.say("\nNon-important files by program and importance level:")?;
        self.say(RULE)?;
        for group in groups.non_empty() {
            self.print_group(group)?;
        }
        self.say(format!(
            "Total: {} files, {:.2} MB",
            groups.total_records().to_string().red(),
            groups.total_size_mb()
        ))
    }

    fn print_group(&self, group: &ProgramGroup) -> io::Result<()> {
        let s = group.summary();
        self.say(format!(
            "{}: {} files (Low: {}, Medium: {}, High: {}), {:.2} MB",
            s.program.bold(),
            s.files,
            s.low,
            s.medium,
            s.high,
            s.size_mb
        ))?;
        for (i, classified) in group.records.iter().enumerate() {
            let record = &classified.record;
            self.say(format!("  {}. Path: {}", i + 1, record.path.display()))?;
            self.say(format!("     Size: {:.2} MB", record.size_mb()))?;
            self.say(format!("     Last Modified: {}", record.modified.to_rfc3339()))?;
            self.say(format!("     Importance: {}", classified.importance()))?;
            self.say(format!("     Reason: {}", classified.classification.reason))?;
            self.say(format!("  {}", RULE))?;
        }
        Ok(())
    }

    fn ask_programs_to_keep(&self, available: &[&str]) -> io::Result<Vec<String>> {
        self.say(format!("\nAvailable programs: {}", available.join(", ")))?;
        loop {
            let answer = self.ask(
                "\nWhich programs' files to KEEP? (e.g., 'Transporter, Others', 'none', or 'all'): ",
            )?;
            match parse_program_choice(&answer, available) {
                Some(keep) => return Ok(keep),
                None => self.say(format!(
                    "Please enter valid programs from {:?}, 'none', or 'all'.",
                    available
                ))?,
            }
        }
    }

    fn ask_tiers_to_delete(&self, group: &ProgramGroup) -> io::Result<BTreeSet<Importance>> {
        let s = group.summary();
        self.say(format!("\nFor {} ({} files):", s.program.bold(), s.files))?;
        self.say(format!("  Low: {}, Medium: {}, High: {}", s.low, s.medium, s.high))?;
        loop {
            let answer =
                self.ask("Which importance levels to DELETE? (e.g., 'Low, Medium', 'all', 'none'): ")?;
            match parse_tier_choice(&answer) {
                Some(tiers) => return Ok(tiers),
                None => self.say("Please enter 'Low', 'Medium', 'High', 'all', or 'none'.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Operator for PromptOperator<R, W> {
    fn choose(&self, groups: &ProgramGroups) -> io::Result<SelectionChoices> {
        self.print_summary(groups)?;

        let available = groups.programs();
        let keep = self.ask_programs_to_keep(&available)?;

        let mut choices = SelectionChoices::new();
        for group in groups.non_empty() {
            if keep.contains(&group.program) {
                choices = choices.keep_program(group.program.as_str());
                continue;
            }
            let tiers = self.ask_tiers_to_delete(group)?;
            choices = choices.delete_tiers(group.program.as_str(), tiers);
        }

        if !keep.is_empty() {
            self.say(format!("\nPrograms you chose to keep: {}", keep.join(", ")))?;
        }
        Ok(choices)
    }

    fn confirm(&self, selection: &SelectionSet) -> io::Result<bool> {
        self.say("\nFiles selected for cleanup:")?;
        for classified in selection.iter() {
            self.say(format!(
                "- {} (Importance: {})",
                classified.record.path.display(),
                classified.importance()
            ))?;
        }

        let answer = self.ask(&format!(
            "\nMove {} files ({:.2} MB) to backup? (y/N): ",
            selection.len(),
            selection.total_size_mb()
        ))?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }
}
