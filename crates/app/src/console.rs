use std::io::{self, BufRead, Write};

use services::LineIo;

/// Line device over the process's stdin and stdout.
pub struct StdIo {
    stdin: io::StdinLock<'static>,
    stdout: io::Stdout,
}

impl StdIo {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stdin: io::stdin().lock(),
            stdout: io::stdout(),
        }
    }
}

impl LineIo for StdIo {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        write!(self.stdout, "> ")?;
        self.stdout.flush()?;
        let mut line = String::new();
        if self.stdin.read_line(&mut line)? == 0 {
            writeln!(self.stdout)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_owned()))
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.stdout, "{line}")
    }
}
