//! Command line splitting and option parsing for the verifier front end.

use crate::error::{Error, Result};
use crate::utf::check_valid_utf8;

/// Split a single command line string into individual arguments, following
/// the Windows lexing rules: whitespace separates, double-quoted sections
/// preserve whitespace, `""` inside quotes is a literal quote, `\"` is a
/// literal quote, `\\` is a literal backslash, and an unterminated quote
/// consumes to the end of the string.
pub fn command_line_lexer(s: &str) -> Result<Vec<String>> {
    enum Status {
        StartOfArg,
        InArg,
        InQuotes,
    }
    let mut status = Status::StartOfArg;
    let mut args: Vec<String> = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let bytes = s.as_bytes();

    fn end_of_arg(current: &mut Vec<u8>, args: &mut Vec<String>) -> Result<()> {
        if !check_valid_utf8(current) {
            return Err(Error::Parser);
        }
        // SAFETY: validated directly above.
        args.push(unsafe { String::from_utf8_unchecked(std::mem::take(current)) });
        Ok(())
    }

    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' && i + 1 < bytes.len() {
            if bytes[i + 1] == b'\\' {
                current.push(b'\\');
                i += 2;
                continue;
            } else if bytes[i + 1] == b'"' {
                current.push(b'"');
                i += 2;
                continue;
            }
        }
        match status {
            Status::StartOfArg => match c {
                b' ' | b'\t' => {}
                b'"' => status = Status::InQuotes,
                _ => {
                    status = Status::InArg;
                    current.push(c);
                }
            },
            Status::InArg => match c {
                b'"' => status = Status::InQuotes,
                b' ' | b'\t' => {
                    end_of_arg(&mut current, &mut args)?;
                    status = Status::StartOfArg;
                }
                _ => current.push(c),
            },
            Status::InQuotes => match c {
                b'"' => {
                    // a doubled quote is a literal quote
                    if i + 1 < bytes.len() && bytes[i + 1] == b'"' {
                        current.push(b'"');
                        i += 1;
                    } else {
                        end_of_arg(&mut current, &mut args)?;
                        status = Status::StartOfArg;
                    }
                }
                _ => current.push(c),
            },
        }
        i += 1;
    }
    while matches!(current.last(), Some(b' ') | Some(b'\t')) {
        current.pop();
    }
    if !current.is_empty() {
        end_of_arg(&mut current, &mut args)?;
    }
    Ok(args)
}

/// Parsed command line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLineOptions {
    /// Files to verify.
    pub files_to_check: Vec<String>,
    /// Results output file; when set, only the first file is verified and
    /// results are written there instead of being displayed.
    pub out_file: Option<String>,
}

/// Build [`CommandLineOptions`] from already-split argument tokens.
///
/// The token `DOALL` is accepted and ignored (everything is always
/// verified); `OUTPUT:<path>` redirects results to `<path>`.
pub fn options_from_tokens<I>(tokens: I) -> CommandLineOptions
where
    I: IntoIterator<Item = String>,
{
    let mut opts = CommandLineOptions::default();
    for arg in tokens {
        if arg == "DOALL" {
            continue;
        }
        if let Some(out) = arg.strip_prefix("OUTPUT:") {
            opts.out_file = Some(out.to_owned());
            continue;
        }
        opts.files_to_check.push(arg);
    }
    if opts.out_file.is_some() {
        // in no-GUI mode, only a single file is checked
        opts.files_to_check.truncate(1);
    }
    opts
}

/// Parse a complete command line string into [`CommandLineOptions`].
pub fn parse_command_line(s: &str) -> Result<CommandLineOptions> {
    Ok(options_from_tokens(command_line_lexer(s)?))
}
