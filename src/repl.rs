use crate::builder::{Direction, Join, JoinKind, OrderKey, SelectQuery};
use crate::config::OutputFormat;
use crate::core::db::{ConnectionProvider, ResultSet};
use crate::core::CommandResult;
use crate::database::{Database, Outcome};
use crate::guard::Confirm;
use crate::source;
use std::io::{self, Write};
use tracing::warn;

/// Represents a parsed shell command.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Create a table from a file and fill it
    Load { path: String, table: Option<String> },
    /// Insert a file with a header line into an existing table
    Append { path: String, table: String },
    Create { table: String, header: String },
    Insert { table: String, row: String },
    Read(SelectQuery),
    Describe(String),
    Tables,
    Drop { table: String, force: bool },
    Empty { table: String, force: bool },
    Reset { force: bool },
    DropDatabase { force: bool },
    Login,
    Logout,
    Help,
    Quit,
    Unknown(String),
}

/// Splits off the first whitespace-delimited word.
fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(at) => (&input[..at], input[at..].trim()),
        None => (input, ""),
    }
}

fn is_force(rest: &str) -> Option<bool> {
    match rest {
        "" => Some(false),
        "!" => Some(true),
        _ => None,
    }
}

/// `<table> [cols=a,b] [order=KEY] [dir=asc|desc] [limit=N] [offset=N] [join=T:LEFT:RIGHT[:KIND]]`
fn parse_read(args: &str) -> Option<SelectQuery> {
    let mut parts = args.split_whitespace();
    let mut query = SelectQuery::new(parts.next()?);
    let mut order = None;
    let mut direction = Direction::Asc;

    for part in parts {
        let (key, value) = part.split_once('=')?;
        match key {
            "cols" => query = query.columns(&source::split_line(value)),
            "order" => order = Some(OrderKey::parse(value)),
            "dir" => direction = Direction::parse(value),
            "limit" => query = query.limit(value.parse().ok()?),
            "offset" => query = query.offset(value.parse().ok()?),
            "join" => {
                let fields: Vec<&str> = value.split(':').collect();
                if fields.len() < 3 || fields.len() > 4 {
                    return None;
                }
                query = query.join(Join {
                    right: fields[0].to_string(),
                    on_left: fields[1].to_string(),
                    on_right: fields[2].to_string(),
                    kind: fields.get(3).map(|k| JoinKind::parse(k)).unwrap_or_default(),
                });
            }
            _ => return None,
        }
    }
    if let Some(key) = order {
        query = query.order_by(key, direction);
    }
    Some(query)
}

/// Parses a user input string into a corresponding `Command`.
///
/// Every command starts with a colon (`:`).
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let unknown = || Command::Unknown(input.to_string());
    let Some(trimmed) = input.strip_prefix(':') else {
        return unknown();
    };
    let (name, rest) = split_word(trimmed);

    match name {
        "load" => {
            let (path, table) = split_word(rest);
            match (path, table) {
                ("", _) => unknown(),
                (path, "") => Command::Load {
                    path: path.to_string(),
                    table: None,
                },
                (path, table) if !table.contains(char::is_whitespace) => Command::Load {
                    path: path.to_string(),
                    table: Some(table.to_string()),
                },
                _ => unknown(),
            }
        }
        "append" => match split_word(rest) {
            (path, table) if !path.is_empty() && !table.is_empty() => Command::Append {
                path: path.to_string(),
                table: table.to_string(),
            },
            _ => unknown(),
        },
        "create" => match split_word(rest) {
            (table, header) if !table.is_empty() && !header.is_empty() => Command::Create {
                table: table.to_string(),
                header: header.to_string(),
            },
            _ => unknown(),
        },
        "insert" => match split_word(rest) {
            (table, row) if !table.is_empty() && !row.is_empty() => Command::Insert {
                table: table.to_string(),
                row: row.to_string(),
            },
            _ => unknown(),
        },
        "read" => parse_read(rest).map(Command::Read).unwrap_or_else(unknown),
        "describe" if !rest.is_empty() => Command::Describe(rest.to_string()),
        "tables" => Command::Tables,
        "drop" | "empty" => {
            let (table, flag) = split_word(rest);
            match (table.is_empty(), is_force(flag)) {
                (false, Some(force)) if name == "drop" => Command::Drop {
                    table: table.to_string(),
                    force,
                },
                (false, Some(force)) => Command::Empty {
                    table: table.to_string(),
                    force,
                },
                _ => unknown(),
            }
        }
        "reset" => is_force(rest)
            .map(|force| Command::Reset { force })
            .unwrap_or_else(unknown),
        "dropdb" => is_force(rest)
            .map(|force| Command::DropDatabase { force })
            .unwrap_or_else(unknown),
        "login" => Command::Login,
        "logout" => Command::Logout,
        "help" => Command::Help,
        "quit" => Command::Quit,
        _ => unknown(),
    }
}

const HELP: &str = "Available commands:
  :load <file> [table] - Create a table from a delimited file and load its rows
  :append <file> <table> - Insert a file with a header line into an existing table
  :create <table> <header> - Create a table from a comma-separated header
  :insert <table> <row> - Insert one row in column order
  :read <table> [cols=a,b] [order=N|name] [dir=asc|desc] [limit=N] [offset=N] [join=table:left:right[:i|l|r]]
  :describe <table> - Show the live column definitions
  :tables - List tables
  :drop <table> [!] - Drop a table (! skips confirmation)
  :empty <table> [!] - Remove all rows from a table
  :reset [!] - Drop and recreate the database
  :dropdb [!] - Drop the database
  :login / :logout - Open or close the connection
  :quit - Exit";

fn render(rows: &ResultSet, format: OutputFormat) -> CommandResult {
    let text = match format {
        OutputFormat::Json => rows.to_json()?,
        OutputFormat::Table => format!("{}\n({} rows)", rows.to_table(), rows.row_count()),
    };
    Ok(Some(text))
}

/// A declined confirmation prints nothing.
fn guarded(outcome: Outcome, done: String) -> Option<String> {
    match outcome {
        Outcome::Executed => Some(done),
        Outcome::Declined => None,
    }
}

/// Executes a parsed command against `database`, returning the message to
/// print on success.
pub fn execute_command<C: Confirm, P: ConnectionProvider>(
    database: &mut Database<C, P>,
    command: Command,
    format: OutputFormat,
) -> CommandResult {
    match command {
        Command::Load { path, table } => {
            let name = database.load_file(&path, table.as_deref())?;
            Ok(Some(format!("Loaded '{}' into table '{}'", path, name)))
        }
        Command::Append { path, table } => {
            let lines = source::read_lines(&path)?;
            let count = database.insert(&lines, &table, true)?;
            Ok(Some(format!("Inserted {} rows into '{}'", count, table)))
        }
        Command::Create { table, header } => {
            let schema = database.create(&header, &table)?;
            Ok(Some(format!(
                "Created table '{}' with {} columns",
                table,
                schema.len()
            )))
        }
        Command::Insert { table, row } => {
            let count = database.insert(&[row], &table, false)?;
            Ok(Some(format!("Inserted {} rows into '{}'", count, table)))
        }
        Command::Read(query) => {
            let rows = database.read(&query)?;
            render(&rows, format)
        }
        Command::Describe(table) => {
            let schema = database.describe(&table)?;
            let mut lines = Vec::with_capacity(schema.len());
            for column in &schema.columns {
                let mut line = format!("{}\t{}", column.name, column.column_type);
                if column.is_primary_key {
                    line.push_str("\tPRIMARY KEY");
                }
                if let Some(target) = &column.references {
                    line.push_str(&format!("\tREFERENCES {}", target.table));
                }
                lines.push(line);
            }
            Ok(Some(lines.join("\n")))
        }
        Command::Tables => Ok(Some(database.tables()?.join("\n"))),
        Command::Drop { table, force } => {
            let outcome = database.drop_table(&table, force)?;
            Ok(guarded(outcome, format!("Dropped table '{}'", table)))
        }
        Command::Empty { table, force } => {
            let outcome = database.empty(&table, force)?;
            Ok(guarded(outcome, format!("Emptied table '{}'", table)))
        }
        Command::Reset { force } => {
            let outcome = database.reset(force)?;
            let name = database.database_name().to_string();
            Ok(guarded(outcome, format!("Reset database '{}'", name)))
        }
        Command::DropDatabase { force } => {
            let outcome = database.drop_database(force)?;
            let name = database.database_name().to_string();
            Ok(guarded(outcome, format!("Dropped database '{}'", name)))
        }
        Command::Login => {
            database.login()?;
            Ok(Some(format!("Logged in to '{}'", database.database_name())))
        }
        Command::Logout => {
            database.logout()?;
            Ok(Some(format!("Logged out of '{}'", database.database_name())))
        }
        Command::Help => Ok(Some(HELP.to_string())),
        Command::Quit => Ok(None),
        Command::Unknown(input) => Ok(Some(format!(
            "Unknown command: {} (type :help for a list)",
            input
        ))),
    }
}

/// Runs the interactive shell over stdin until `:quit` or end of input.
pub fn run_repl<C: Confirm, P: ConnectionProvider>(
    database: &mut Database<C, P>,
    format: OutputFormat,
) {
    println!("Welcome to the tabql shell! Type :help for commands, :quit to exit.");
    let mut input = String::new();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }
        input.clear();
        match io::stdin().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Could not read input: {}", e);
                break;
            }
        }
        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }

        let command = parse_command(trimmed);
        if command == Command::Quit {
            break;
        }
        match execute_command(database, command, format) {
            Ok(Some(message)) => println!("{}", message),
            Ok(None) => {}
            Err(e) => println!("ERROR: {}", e),
        }
    }
}
