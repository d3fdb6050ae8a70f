//! Interactive question/answer front end, used when neither a directory nor
//! a config file is given on the command line.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::NaiveDate;
use mediastamp_core::date::parse_fallback_date;
use mediastamp_core::{Mode, RunConfig};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, message: &str) -> io::Result<String> {
        write!(self.output, "{message}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim().to_string())
    }

    /// Ask until the (lower-cased) answer is one of `options`.
    pub fn choice(&mut self, message: &str, options: &[&str]) -> io::Result<String> {
        loop {
            let answer = self.ask(message)?.to_lowercase();
            if options.contains(&answer.as_str()) {
                return Ok(answer);
            }
            writeln!(self.output, "Invalid input. Please try again.")?;
        }
    }

    pub fn yes_no(&mut self, message: &str) -> io::Result<bool> {
        Ok(self.choice(message, &["yes", "no"])? == "yes")
    }

    pub fn date(&mut self, message: &str) -> io::Result<NaiveDate> {
        loop {
            match parse_fallback_date(&self.ask(message)?) {
                Ok(d) => return Ok(d),
                Err(_) => writeln!(self.output, "Invalid date format. Please use YYYY:MM:DD.")?,
            }
        }
    }

    pub fn text(&mut self, message: &str) -> io::Result<String> {
        self.ask(message)
    }
}

/// Walk the user through every setting. `mode` and `date` skip their
/// question when already known.
pub fn interactive_config<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    mode: Option<Mode>,
    date: Option<NaiveDate>,
) -> io::Result<RunConfig> {
    let mode = match mode {
        Some(m) => m,
        None => {
            let names: Vec<&str> = Mode::ALL.iter().map(|m| m.as_str()).collect();
            let message = format!("Select mode ({}): ", names.join("/"));
            // only listed names are accepted, so this parse cannot fail
            prompter
                .choice(&message, &names)?
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{e}")))?
        }
    };
    let directory = PathBuf::from(prompter.text("Enter the directory of images/videos: ")?);
    let skip_backup =
        prompter.yes_no("Override original files without creating a backup? (yes/no): ")?;
    let recursive =
        prompter.yes_no("Recursively process images in subdirectories? (yes/no): ")?;

    let fallback_date = match date {
        Some(d) => Some(d),
        None if !mode.embeds_date() => {
            Some(prompter.date(&format!("Enter the date for {mode} files (YYYY:MM:DD): "))?)
        }
        None => None,
    };

    Ok(RunConfig {
        recursive,
        skip_backup,
        fallback_date,
        ..RunConfig::new(mode, directory)
    })
}
