//! Line-oriented console: statements accumulate until a terminating `;`, each
//! statement is simulated and then executed for real; dot-commands manage the
//! store and walk the steps of the last statement.

use std::fs;
use std::io::{self, BufRead, Write};

use log::{debug, info, warn};

use crate::config::{AppPreferences, SimulatorConfig};
use crate::models::Step;
use crate::query_ast::{QueryAstError, RelationalStore, Simulator, SqliteStore, split_statements};
use crate::{query_tools, render};

const HELP: &str = "\
.help              Show this message
.exit | .quit      Leave the console
.tables            List tables
.schema            Show CREATE statements
.open [PATH]       Open a SQLite file (in-memory when PATH is omitted)
.read PATH         Execute the statements in a file
.visualize on|off  Print every step after each statement
.steps             List the steps of the last statement
.next | .prev      Move through the steps
.step N            Jump to step N (1-based)
.explain SQL       Show how a statement is parsed
.json              Print the last steps as JSON";

/// Position over the steps of the last simulated statement, clamped to the
/// sequence.
#[derive(Debug, Default, Clone)]
pub struct StepCursor {
    steps: Vec<Step>,
    position: usize,
}

impl StepCursor {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps, position: 0 }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> Option<&Step> {
        self.steps.get(self.position)
    }

    pub fn next(&mut self) -> Option<&Step> {
        if self.position + 1 < self.steps.len() {
            self.position += 1;
        }
        self.current()
    }

    pub fn prev(&mut self) -> Option<&Step> {
        self.position = self.position.saturating_sub(1);
        self.current()
    }

    /// Jump to `index` (zero based), clamped to the last step.
    pub fn seek(&mut self, index: usize) -> Option<&Step> {
        self.position = index.min(self.steps.len().saturating_sub(1));
        self.current()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Console<W: Write> {
    store: SqliteStore,
    prefs: AppPreferences,
    config: SimulatorConfig,
    cursor: StepCursor,
    buffer: String,
    out: W,
    color: bool,
    prompt: bool,
}

impl<W: Write> Console<W> {
    pub fn new(store: SqliteStore, prefs: AppPreferences, out: W) -> Self {
        let config = SimulatorConfig::from_preferences(&prefs);
        Self {
            store,
            prefs,
            config,
            cursor: StepCursor::default(),
            buffer: String::new(),
            out,
            color: false,
            prompt: false,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn cursor(&self) -> &StepCursor {
        &self.cursor
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Read lines until end of input or `.exit`.
    pub fn run(&mut self, input: impl BufRead) -> io::Result<()> {
        self.show_prompt()?;
        for line in input.lines() {
            if self.feed_line(&line?)? == Flow::Exit {
                return Ok(());
            }
            self.show_prompt()?;
        }
        let rest = std::mem::take(&mut self.buffer);
        if !rest.trim().is_empty() {
            self.run_script(&rest)?;
        }
        Ok(())
    }

    fn show_prompt(&mut self) -> io::Result<()> {
        if self.prompt {
            let prompt = if self.buffer.is_empty() { "sqlstep> " } else { "   ...> " };
            write!(self.out, "{}", prompt)?;
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn feed_line(&mut self, line: &str) -> io::Result<Flow> {
        if self.buffer.trim().is_empty() && line.trim_start().starts_with('.') {
            self.buffer.clear();
            return self.dot_command(line.trim());
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');
        if line.trim_end().ends_with(';') {
            let script = std::mem::take(&mut self.buffer);
            self.run_script(&script)?;
        }
        Ok(Flow::Continue)
    }

    pub fn run_script(&mut self, script: &str) -> io::Result<()> {
        for statement in split_statements(script) {
            self.run_statement(statement)?;
        }
        Ok(())
    }

    /// Simulate, then execute against the store. A failed simulation never
    /// blocks execution.
    pub fn run_statement(&mut self, sql: &str) -> io::Result<()> {
        let simulator = Simulator::new(&self.store, self.config.clone());
        self.cursor = match simulator.simulate(sql) {
            Ok(steps) => {
                debug!("console: {} steps for {}", steps.len(), sql);
                StepCursor::new(steps)
            }
            Err(QueryAstError::Syntax(e)) => {
                debug!("console: not simulated ({})", e);
                StepCursor::default()
            }
            Err(e) => {
                warn!("console: simulation failed: {}", e);
                StepCursor::default()
            }
        };

        match self.store.execute(sql) {
            Ok(tables) => {
                for table in &tables {
                    writeln!(self.out, "{}", render::render_result(table))?;
                }
            }
            Err(e) => writeln!(self.out, "Error: {}", e)?,
        }

        if self.prefs.visualize {
            for idx in 0..self.cursor.len() {
                self.print_step(idx)?;
            }
        }
        Ok(())
    }

    fn print_step(&mut self, idx: usize) -> io::Result<()> {
        match self.cursor.steps().get(idx) {
            Some(step) => {
                let text = render::render_step(step, idx, self.cursor.len(), self.color);
                writeln!(self.out, "{}", text)
            }
            None => writeln!(self.out, "No steps. Run a SELECT with a FROM clause first."),
        }
    }

    fn dot_command(&mut self, line: &str) -> io::Result<Flow> {
        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (line, ""),
        };
        match command {
            ".exit" | ".quit" => return Ok(Flow::Exit),
            ".help" => writeln!(self.out, "{}", HELP)?,
            ".tables" => match self.store.table_names() {
                Ok(names) => writeln!(self.out, "{}", names.join("  "))?,
                Err(e) => writeln!(self.out, "Error: {}", e)?,
            },
            ".schema" => match self.store.schema() {
                Ok(statements) => {
                    for s in statements {
                        writeln!(self.out, "{}", query_tools::format_sql(&s))?;
                    }
                }
                Err(e) => writeln!(self.out, "Error: {}", e)?,
            },
            ".open" => {
                let opened = if arg.is_empty() { SqliteStore::open_in_memory() } else { SqliteStore::open(arg) };
                match opened {
                    Ok(store) => {
                        info!("console: switched to {}", store.store_name());
                        self.store = store;
                        self.cursor = StepCursor::default();
                    }
                    Err(e) => writeln!(self.out, "Error: {}", e)?,
                }
            }
            ".read" if arg.is_empty() => writeln!(self.out, "Usage: .read PATH")?,
            ".read" => match fs::read_to_string(arg) {
                Ok(script) => self.run_script(&script)?,
                Err(e) => writeln!(self.out, "Error: cannot read {}: {}", arg, e)?,
            },
            ".visualize" => match arg.to_ascii_lowercase().as_str() {
                "on" => self.prefs.visualize = true,
                "off" => self.prefs.visualize = false,
                _ => writeln!(self.out, "Usage: .visualize on|off")?,
            },
            ".steps" => {
                if self.cursor.is_empty() {
                    writeln!(self.out, "No steps.")?;
                }
                for (idx, step) in self.cursor.steps().iter().enumerate() {
                    let marker = if idx == self.cursor.position() { '>' } else { ' ' };
                    writeln!(self.out, "{} {}. {}", marker, idx + 1, step.title())?;
                }
            }
            ".next" => {
                self.cursor.next();
                self.print_step(self.cursor.position())?;
            }
            ".prev" => {
                self.cursor.prev();
                self.print_step(self.cursor.position())?;
            }
            ".step" => match arg.parse::<usize>() {
                Ok(n) if n >= 1 => {
                    self.cursor.seek(n - 1);
                    self.print_step(self.cursor.position())?;
                }
                _ => writeln!(self.out, "Usage: .step N")?,
            },
            ".explain" => match query_tools::explain(arg) {
                Ok(explanation) => {
                    writeln!(self.out, "{}", explanation.formatted)?;
                    for lint in explanation.lints {
                        writeln!(self.out, "-- {:?}: {}", lint.severity, lint.message)?;
                        if let Some(hint) = lint.hint {
                            writeln!(self.out, "--   {}", hint)?;
                        }
                    }
                }
                Err(e) => writeln!(self.out, "Error: {}", e)?,
            },
            ".json" => match serde_json::to_string_pretty(self.cursor.steps()) {
                Ok(json) => writeln!(self.out, "{}", json)?,
                Err(e) => writeln!(self.out, "Error: {}", e)?,
            },
            other => writeln!(self.out, "Unknown command: {}. Try .help", other)?,
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StepKind;

    fn console() -> Console<Vec<u8>> {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut c = Console::new(store, AppPreferences::default(), Vec::new());
        c.run_script(
            "CREATE TABLE dogs (name TEXT, weight INTEGER);\
             INSERT INTO dogs VALUES ('rex', 40), ('fido', 12), ('max', 70);",
        )
        .unwrap();
        c
    }

    fn output(c: Console<Vec<u8>>) -> String {
        String::from_utf8(c.into_output()).unwrap()
    }

    #[test]
    fn cursor_is_clamped() {
        let steps = vec![
            Step::side_by_side(StepKind::Load, vec![]),
            Step::side_by_side(StepKind::Result, vec![]),
        ];
        let mut cursor = StepCursor::new(steps);
        assert_eq!(cursor.prev().map(|s| s.kind), Some(StepKind::Load));
        assert_eq!(cursor.next().map(|s| s.kind), Some(StepKind::Result));
        assert_eq!(cursor.next().map(|s| s.kind), Some(StepKind::Result));
        assert_eq!(cursor.seek(10).map(|s| s.kind), Some(StepKind::Result));
        assert_eq!(cursor.position(), 1);
        assert!(StepCursor::default().seek(3).is_none());
    }

    #[test]
    fn statements_accumulate_until_semicolon() {
        let mut c = console();
        c.feed_line("SELECT name FROM dogs").unwrap();
        assert!(c.cursor().is_empty());
        c.feed_line("WHERE weight > 20;").unwrap();
        assert_eq!(c.cursor().len(), 4);
        let out = output(c);
        assert!(out.contains("| rex "), "{}", out);
        assert!(out.contains("(2 rows)"), "{}", out);
    }

    #[test]
    fn store_errors_are_printed() {
        let mut c = console();
        c.feed_line("SELECT * FROM cats;").unwrap();
        assert!(output(c).contains("Error: no such table: cats"));
    }

    #[test]
    fn non_select_statements_still_execute() {
        let mut c = console();
        c.feed_line("INSERT INTO dogs VALUES ('ace', 5);").unwrap();
        c.feed_line("SELECT count(*) AS n FROM dogs;").unwrap();
        assert!(output(c).contains("| 4 |"));
    }

    #[test]
    fn stepping_commands_walk_the_last_statement() {
        let mut c = console();
        c.feed_line("SELECT * FROM dogs WHERE weight < 50;").unwrap();
        c.feed_line(".next").unwrap();
        c.feed_line(".step 3").unwrap();
        c.feed_line(".steps").unwrap();
        let out = output(c);
        assert!(out.contains("Step 2/4: WHERE: kept and rejected rows"), "{}", out);
        assert!(out.contains("Step 3/4: WHERE: kept rows"), "{}", out);
        assert!(out.contains("> 3. WHERE: kept rows"), "{}", out);
    }

    #[test]
    fn visualize_prints_every_step() {
        let mut c = console();
        c.feed_line(".visualize on").unwrap();
        c.feed_line("SELECT * FROM dogs;").unwrap();
        let out = output(c);
        assert!(out.contains("Step 1/2: Input tables"));
        assert!(out.contains("Step 2/2: Result"));
    }

    #[test]
    fn json_dumps_steps() {
        let mut c = console();
        c.feed_line("SELECT * FROM dogs;").unwrap();
        c.feed_line(".json").unwrap();
        assert!(output(c).contains("\"kind\": \"load\""));
    }

    #[test]
    fn exit_and_unknown_commands() {
        let mut c = console();
        assert_eq!(c.feed_line(".bogus").unwrap(), Flow::Continue);
        assert_eq!(c.feed_line(".quit").unwrap(), Flow::Exit);
        assert!(output(c).contains("Unknown command: .bogus"));
    }

    #[test]
    fn read_runs_a_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sql");
        fs::write(&path, "CREATE TABLE t (a);\nINSERT INTO t VALUES (1);\nSELECT a FROM t;\n").unwrap();
        let mut c = console();
        c.feed_line(&format!(".read {}", path.display())).unwrap();
        assert_eq!(c.store().table_names().unwrap(), vec!["dogs".to_string(), "t".to_string()]);
    }

    #[test]
    fn explain_prints_formatted_sql() {
        let mut c = console();
        c.feed_line(".explain select * from dogs, dogs as d2").unwrap();
        let out = output(c);
        assert!(out.contains("SELECT"), "{}", out);
        assert!(out.contains("cartesian product"), "{}", out);
    }
}
