//! Console commands and the stdout/stderr [`Call`] they run against.

use linecmd::prelude::*;
use linecmd::ConfigError;

/// One console line. Responses go to stdout, errors to stderr.
pub struct ConsoleCall {
    text: String,
    quit: bool,
}

impl ConsoleCall {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quit: false,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    fn request_quit(&mut self) {
        self.quit = true;
    }
}

impl Call for ConsoleCall {
    fn call_text(&self) -> &str {
        &self.text
    }

    fn respond(&mut self, message: &str) {
        println!("{message}");
    }

    fn error(&mut self, message: &str) {
        eprintln!("error: {message}");
    }
}

pub fn commands() -> Result<Vec<Command<ConsoleCall>>, ConfigError> {
    Ok(vec![echo()?, sum()?, quit()?])
}

fn echo() -> Result<Command<ConsoleCall>, ConfigError> {
    Command::<ConsoleCall>::builder("echo")
        .description("Print text back")
        .alias("say")
        .string(arg("text").short("t").help("Text to print"))?
        .integer(
            arg("times")
                .short("n")
                .help("How many times")
                .required(false)
                .default(1),
        )?
        .boolean(
            arg("upper")
                .short("u")
                .help("Print in upper case")
                .required(false),
        )?
        .runs(|call, m| {
            let times: i32 = m.get_optional("times")?;
            if times < 1 {
                return Err(format!("times must be at least 1, got {times}").into());
            }
            let mut text: String = m.get_required("text")?;
            if m.get_optional::<bool>("upper")? {
                text = text.to_uppercase();
            }
            for _ in 0..times {
                call.respond(&text);
            }
            Ok(())
        })
        .build()
}

fn sum() -> Result<Command<ConsoleCall>, ConfigError> {
    Command::<ConsoleCall>::builder("sum")
        .description("Add two numbers")
        .alias("add")
        .by_order()
        .double(arg("a").help("First operand"))?
        .double(arg("b").help("Second operand"))?
        .runs(|call, m| {
            let a: f64 = m.get_required("a")?;
            let b: f64 = m.get_required("b")?;
            call.success(&format!("{}", a + b));
            Ok(())
        })
        .build()
}

fn quit() -> Result<Command<ConsoleCall>, ConfigError> {
    Command::<ConsoleCall>::builder("quit")
        .description("Stop reading input")
        .alias("exit")
        .runs(|call, _| {
            call.request_quit();
            Ok(())
        })
        .build()
}
