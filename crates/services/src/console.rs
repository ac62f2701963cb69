//! Line-oriented driver connecting a [`TutorEngine`] to an input/output
//! device.

use std::collections::VecDeque;
use std::io;

use crate::sessions::{Session, TutorEngine};

/// Synchronous line device.
pub trait LineIo {
    /// Next input line without its terminator, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the underlying device.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// # Errors
    ///
    /// Returns any error raised by the underlying device.
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Runs a session until the learner leaves or input ends, returning the
/// final session.
///
/// # Errors
///
/// Returns the first I/O error raised by `io`; progress up to that point has
/// already been saved.
pub async fn drive(engine: &TutorEngine, io: &mut dyn LineIo) -> io::Result<Session> {
    let start = engine.start();
    write_all(io, &start.output)?;
    let mut session = start.session;
    loop {
        let Some(line) = io.read_line()? else {
            let end = engine.shutdown(session).await;
            write_all(io, &end.output)?;
            return Ok(end.session);
        };
        let next = engine.handle(session, &line).await;
        write_all(io, &next.output)?;
        let finished = next.is_finished();
        session = next.session;
        if finished {
            return Ok(session);
        }
    }
}

fn write_all(io: &mut dyn LineIo, lines: &[String]) -> io::Result<()> {
    for line in lines {
        io.write_line(line)?;
    }
    Ok(())
}

/// In-memory device fed from a fixed script; records everything written.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIo {
    inputs: VecDeque<String>,
    output: Vec<String>,
}

impl ScriptedIo {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            output: Vec::new(),
        }
    }

    #[must_use]
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Whether any written line contains `needle`.
    #[must_use]
    pub fn saw(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }
}

impl LineIo for ScriptedIo {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.inputs.pop_front())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.output.push(line.to_owned());
        Ok(())
    }
}
