//! SMTP command parser.
//!
//! Parses client command lines as described in RFC 5321 section 4.1, with
//! the usual leniency of deployed servers: verbs are case-insensitive,
//! a space after `FROM:`/`TO:` is tolerated and paths may omit the angle
//! brackets.

use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::Address;

/// Parses a command line (without CRLF) into a [`Command`].
///
/// # Errors
///
/// Returns an error if the arguments of a known verb are malformed.
pub fn parse_command(line: &[u8]) -> Result<Command> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    let (verb, args) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, args)| (verb, args.trim()));

    match verb.to_ascii_uppercase().as_str() {
        "HELO" => Ok(Command::Helo {
            hostname: required(args, "HELO requires a domain")?,
        }),
        "EHLO" => Ok(Command::Ehlo {
            hostname: required(args, "EHLO requires a domain")?,
        }),
        "MAIL" => parse_mail(args),
        "RCPT" => parse_rcpt(args),
        "DATA" => no_arguments(args, Command::Data),
        "RSET" => no_arguments(args, Command::Rset),
        "QUIT" => no_arguments(args, Command::Quit),
        "NOOP" => Ok(Command::Noop),
        "HELP" => Ok(Command::Help),
        "VRFY" => Ok(Command::Vrfy {
            address: required(args, "VRFY requires an argument")?,
        }),
        _ => Ok(Command::Unknown {
            verb: verb.to_string(),
        }),
    }
}

fn required(args: &str, message: &str) -> Result<String> {
    if args.is_empty() {
        Err(Error::syntax(message))
    } else {
        Ok(args.to_string())
    }
}

fn no_arguments(args: &str, command: Command) -> Result<Command> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(Error::syntax(format!(
            "{} takes no arguments",
            command.verb()
        )))
    }
}

/// Strips a case-insensitive keyword such as `FROM:` from the arguments.
fn strip_keyword<'a>(args: &'a str, keyword: &str) -> Option<&'a str> {
    let head = args.get(..keyword.len())?;
    head.eq_ignore_ascii_case(keyword)
        .then(|| args[keyword.len()..].trim_start())
}

fn parse_mail(args: &str) -> Result<Command> {
    let rest = strip_keyword(args, "FROM:")
        .ok_or_else(|| Error::syntax("expected MAIL FROM:<address>"))?;
    let (path, params) = split_path(rest)?;

    let from = if path.is_empty() {
        None
    } else {
        Some(Address::new(path)?)
    };

    let mut body = None;
    let mut size = None;
    for param in params.split_whitespace() {
        let (key, value) = param.split_once('=').unwrap_or((param, ""));
        match key.to_ascii_uppercase().as_str() {
            "SIZE" => {
                size = Some(
                    value
                        .parse()
                        .map_err(|_| Error::syntax(format!("invalid SIZE value: {value}")))?,
                );
            }
            "BODY" => match value.to_ascii_uppercase().as_str() {
                v @ ("7BIT" | "8BITMIME") => body = Some(v.to_string()),
                _ => return Err(Error::UnsupportedParameter(param.to_string())),
            },
            "SMTPUTF8" if value.is_empty() => {}
            _ => return Err(Error::UnsupportedParameter(param.to_string())),
        }
    }

    Ok(Command::MailFrom { from, body, size })
}

fn parse_rcpt(args: &str) -> Result<Command> {
    let rest =
        strip_keyword(args, "TO:").ok_or_else(|| Error::syntax("expected RCPT TO:<address>"))?;
    let (path, params) = split_path(rest)?;

    if let Some(param) = params.split_whitespace().next() {
        return Err(Error::UnsupportedParameter(param.to_string()));
    }
    if path.is_empty() {
        return Err(Error::syntax("RCPT TO requires an address"));
    }
    // RFC 5321 section 4.5.1: the bare mailbox must be accepted.
    if path.eq_ignore_ascii_case("postmaster") {
        return Ok(Command::RcptTo {
            to: Address::postmaster(path),
        });
    }

    Ok(Command::RcptTo {
        to: Address::new(path)?,
    })
}

/// Splits `<path> params` into the mailbox and the parameter string.
///
/// A source route (`<@relay:user@example.com>`) is discarded.
fn split_path(rest: &str) -> Result<(&str, &str)> {
    let (path, params) = if let Some(inner) = rest.strip_prefix('<') {
        let end = inner
            .find('>')
            .ok_or_else(|| Error::syntax("unterminated path"))?;
        (&inner[..end], &inner[end + 1..])
    } else {
        rest.split_once(char::is_whitespace).unwrap_or((rest, ""))
    };

    let path = match path.split_once(':') {
        Some((route, mailbox)) if route.starts_with('@') => mailbox,
        _ => path,
    };

    Ok((path.trim(), params.trim()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    #[test]
    fn test_parse_helo_ehlo() {
        assert_eq!(
            parse_command(b"HELO client.example.com").unwrap(),
            Command::Helo {
                hostname: "client.example.com".to_string()
            }
        );
        assert_eq!(
            parse_command(b"ehlo [192.0.2.1]").unwrap(),
            Command::Ehlo {
                hostname: "[192.0.2.1]".to_string()
            }
        );
        assert!(parse_command(b"EHLO").is_err());
    }

    #[test]
    fn test_parse_mail_from() {
        assert_eq!(
            parse_command(b"MAIL FROM:<organizer@example.com>").unwrap(),
            Command::MailFrom {
                from: Some(addr("organizer@example.com")),
                body: None,
                size: None,
            }
        );
    }

    #[test]
    fn test_parse_mail_from_with_params() {
        assert_eq!(
            parse_command(b"mail from:<organizer@example.com> BODY=8bitmime SIZE=12345 SMTPUTF8")
                .unwrap(),
            Command::MailFrom {
                from: Some(addr("organizer@example.com")),
                body: Some("8BITMIME".to_string()),
                size: Some(12345),
            }
        );
    }

    #[test]
    fn test_parse_mail_from_lenient_forms() {
        let expected = Command::MailFrom {
            from: Some(addr("organizer@example.com")),
            body: None,
            size: None,
        };
        assert_eq!(
            parse_command(b"MAIL FROM: <organizer@example.com>").unwrap(),
            expected
        );
        assert_eq!(
            parse_command(b"MAIL FROM:organizer@example.com").unwrap(),
            expected
        );
        assert_eq!(
            parse_command(b"MAIL FROM:<@relay.example:organizer@example.com>").unwrap(),
            expected
        );
    }

    #[test]
    fn test_parse_mail_null_sender() {
        assert_eq!(
            parse_command(b"MAIL FROM:<>").unwrap(),
            Command::MailFrom {
                from: None,
                body: None,
                size: None,
            }
        );
    }

    #[test]
    fn test_parse_mail_errors() {
        assert!(matches!(
            parse_command(b"MAIL <a@b.c>"),
            Err(Error::Syntax(_))
        ));
        assert!(matches!(
            parse_command(b"MAIL FROM:<a@b.c"),
            Err(Error::Syntax(_))
        ));
        assert!(matches!(
            parse_command(b"MAIL FROM:<a@b.c> SIZE=big"),
            Err(Error::Syntax(_))
        ));
        assert!(matches!(
            parse_command(b"MAIL FROM:<a@b.c> RET=FULL"),
            Err(Error::UnsupportedParameter(_))
        ));
        assert!(matches!(
            parse_command(b"MAIL FROM:<not-an-address>"),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_rcpt_to() {
        assert_eq!(
            parse_command(b"RCPT TO:<Invites@Tasks.Example>").unwrap(),
            Command::RcptTo {
                to: addr("Invites@Tasks.Example")
            }
        );
        assert!(parse_command(b"RCPT TO:<>").is_err());
        assert!(parse_command(b"RCPT FROM:<a@b.c>").is_err());
        assert!(matches!(
            parse_command(b"RCPT TO:<a@b.c> NOTIFY=NEVER"),
            Err(Error::UnsupportedParameter(_))
        ));
    }

    #[test]
    fn test_parse_rcpt_to_postmaster() {
        for line in [&b"RCPT TO:<postmaster>"[..], b"RCPT TO:<PostMaster>", b"rcpt to:Postmaster"] {
            let Command::RcptTo { to } = parse_command(line).unwrap() else {
                panic!("expected RCPT TO");
            };
            assert!(to.as_str().eq_ignore_ascii_case("postmaster"));
            assert_eq!(to.domain(), "");
        }
        assert!(parse_command(b"RCPT TO:<webmaster>").is_err());
    }

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(parse_command(b"DATA").unwrap(), Command::Data);
        assert_eq!(parse_command(b"rset").unwrap(), Command::Rset);
        assert_eq!(parse_command(b"QUIT").unwrap(), Command::Quit);
        assert_eq!(parse_command(b"NOOP anything").unwrap(), Command::Noop);
        assert_eq!(parse_command(b"HELP MAIL").unwrap(), Command::Help);
        assert!(parse_command(b"DATA now").is_err());
    }

    #[test]
    fn test_parse_vrfy() {
        assert_eq!(
            parse_command(b"VRFY postmaster").unwrap(),
            Command::Vrfy {
                address: "postmaster".to_string()
            }
        );
        assert!(parse_command(b"VRFY").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        assert_eq!(
            parse_command(b"STARTTLS").unwrap(),
            Command::Unknown {
                verb: "STARTTLS".to_string()
            }
        );
        assert_eq!(
            parse_command(b"").unwrap(),
            Command::Unknown {
                verb: String::new()
            }
        );
    }
}
