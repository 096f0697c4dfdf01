use crate::inbox::flow::{ConsentFlow, ConsentState, Modal};

use super::console::Console;
use super::report_error;
use super::requests::{print_list, print_request};

const HELP: &str = "\
Commands:
  list                 Show the loaded requests
  refresh              Reload requests from the server
  show <id>            Open a request's details
  accept <id>          Ask to grant consent to a pending request
  confirm              Grant consent to the open request
  set <key> <value>    Fill a requested field
  submit               Send the filled fields
  reject <id>          Decline a pending request
  delete <id>          Remove a request permanently
  cancel               Close whatever is open
  help                 Show this help
  quit                 Leave the inbox";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxCommand {
    List,
    Refresh,
    Show(String),
    Accept(String),
    Confirm,
    Set { key: String, value: String },
    Submit,
    Reject(String),
    Delete(String),
    Cancel,
    Help,
    Quit,
}

impl InboxCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        let Some((verb, rest)) = split_word(line) else {
            return Ok(None);
        };
        let id = |name: &str| -> Result<String, String> {
            match rest.split_whitespace().next() {
                Some(id) => Ok(id.to_string()),
                None => Err(format!("Usage: {name} <id>")),
            }
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "list" | "ls" => Self::List,
            "refresh" => Self::Refresh,
            "show" => Self::Show(id("show")?),
            "accept" => Self::Accept(id("accept")?),
            "confirm" | "yes" => Self::Confirm,
            "set" => match split_word(rest) {
                Some((key, value)) => Self::Set {
                    key: key.to_string(),
                    value: value.to_string(),
                },
                None => return Err("Usage: set <key> <value>".into()),
            },
            "submit" => Self::Submit,
            "reject" => Self::Reject(id("reject")?),
            "delete" | "rm" => Self::Delete(id("delete")?),
            "cancel" | "close" => Self::Cancel,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("Unknown command '{other}'. Type 'help'.")),
        };
        Ok(Some(command))
    }
}

fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    Some(match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    })
}

pub async fn run(flow: &mut ConsentFlow) -> anyhow::Result<()> {
    let mut console = Console::new();

    match flow.refresh().await {
        Ok(_) => print_list(flow),
        Err(e) => report_error(&e.into()),
    }
    println!("Type 'help' for commands.");

    loop {
        let prompt = match flow.selected() {
            Some(request) => format!("inbox [{}]> ", request.id),
            None => "inbox> ".to_string(),
        };
        let Some(line) = console.read_line(&prompt).await? else {
            break;
        };
        let command = match InboxCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };
        if command == InboxCommand::Quit {
            break;
        }
        if let Err(e) = execute(flow, command).await {
            report_error(&e);
        }
    }
    Ok(())
}

async fn execute(flow: &mut ConsentFlow, command: InboxCommand) -> anyhow::Result<()> {
    match command {
        InboxCommand::List => print_list(flow),
        InboxCommand::Refresh => match flow.refresh().await {
            Ok(_) => print_list(flow),
            Err(e) => {
                // Keep showing what was loaded before
                print_list(flow);
                return Err(e.into());
            }
        },
        InboxCommand::Show(id) => {
            let request = flow.open_details(&id)?.clone();
            print_request(&request, flow.state_of(&id));
            if request.is_pending() {
                println!("Type 'accept {id}' then 'confirm' to grant consent, 'reject {id}' to decline, or 'cancel'.");
            }
        }
        InboxCommand::Accept(id) => {
            let request = flow.open_consent(&id)?;
            println!(
                "{} is asking for access: {}",
                request.sender, request.description
            );
            println!("Type 'confirm' to grant consent or 'cancel' to go back.");
        }
        InboxCommand::Confirm => match flow.confirm().await? {
            ConsentState::AwaitingDynamicFields => {
                println!("Consent granted. The requester asks for the following:");
                print_form(flow);
                println!("Fill them with 'set <key> <value>', then 'submit'.");
            }
            _ => println!("Consent granted."),
        },
        InboxCommand::Set { key, value } => {
            flow.set_field(&key, &value)?;
            print_form(flow);
        }
        InboxCommand::Submit => {
            flow.submit().await?;
            println!("Submitted.");
        }
        InboxCommand::Reject(id) => {
            flow.reject(&id).await?;
            println!("Request {id} rejected.");
        }
        InboxCommand::Delete(id) => {
            flow.delete(&id).await?;
            println!("Request {id} deleted.");
        }
        InboxCommand::Cancel => match flow.cancel() {
            Some(id) => println!("Closed {id}."),
            None => println!("Nothing is open."),
        },
        InboxCommand::Help => println!("{HELP}"),
        InboxCommand::Quit => {}
    }
    Ok(())
}

fn print_form(flow: &ConsentFlow) {
    let Modal::FieldsForm(form) = flow.modal() else {
        return;
    };
    for f in &form.fields {
        let value = form.values.get(&f.key).map(String::as_str).unwrap_or_default();
        let marker = if f.required { "*" } else { " " };
        println!("  {marker} {} ({}, {}): {value}", f.label, f.key, f.kind.as_str());
    }
}
