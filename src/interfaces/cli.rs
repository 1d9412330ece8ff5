use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Args, Command, FromArgMatches, Parser};
use console::style;

use crate::application::commands::{OperateCatalogCommand, RecordSource, SelectFilesCommand};
use crate::domain::condition::{CommentStatus, Condition};
use crate::domain::registry::ConditionRegistry;
use crate::infrastructure::database::ConnectionSettings;
use crate::infrastructure::statement::OperationMode;
use crate::interfaces::settings::{self, ConnectionDraft};

/// Connection options shared by both tools.
#[derive(Debug, Args)]
pub struct GeneralArgs {
    /// Server of the catalog database
    #[arg(long, short = 'S')]
    pub server: Option<String>,
    /// User account
    #[arg(long, short = 'U')]
    pub user: Option<String>,
    /// Password for that user to log in
    #[arg(long, short = 'W')]
    pub passwd: Option<String>,
    /// Name of the database
    #[arg(long, short = 'D')]
    pub database: Option<String>,
    /// Port of the connection
    #[arg(long, short = 'P')]
    pub port: Option<u16>,
    /// Settings file for the connection (key=value lines)
    #[arg(long, short = 'o')]
    pub options: Option<String>,
    /// Table of records concerned
    #[arg(long = "type", short = 'T')]
    pub table: Option<String>,
}

impl GeneralArgs {
    pub fn resolve(&self, allow_default_account: bool) -> Result<ConnectionSettings> {
        let mut draft = ConnectionDraft::default();
        if let Some(options) = &self.options {
            settings::ingest_options_file(&mut draft, options);
        }
        if let Some(server) = &self.server {
            draft.server = Some(server.clone());
        }
        if let Some(user) = &self.user {
            draft.user = Some(user.clone());
        }
        if let Some(passwd) = &self.passwd {
            draft.password = Some(passwd.clone());
        }
        if let Some(database) = &self.database {
            draft.database = Some(database.clone());
        }
        if let Some(table) = &self.table {
            draft.table = Some(table.clone());
        }
        if let Some(port) = self.port {
            draft.port = Some(port);
        }
        draft.finish(allow_default_account)
    }
}

#[derive(Debug, Args)]
struct SelectStaticArgs {
    #[command(flatten)]
    general: GeneralArgs,
    /// Save the output into this file
    #[arg(long, short = 'O')]
    output: Option<PathBuf>,
    /// Only save the output into this file
    #[arg(long, short = 'R', conflicts_with = "output")]
    redirect: Option<PathBuf>,
    /// Name hints of data files ("*" accepted)
    #[arg(long, short = 'f', num_args = 1..)]
    filename: Vec<String>,
    /// Items to print (the lower the more)
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    print_level: i32,
    /// 0: no comment; 1: with comment; 2: not limited
    #[arg(long, short = 'C', default_value_t = 0)]
    comment_state: i32,
    /// Only keep records with comments
    #[arg(long)]
    comment_required: bool,
    /// Keep records with and without comments
    #[arg(long, conflicts_with = "comment_required")]
    comment_uncontrolled: bool,
}

/// The select tool registers one option per registry entry, so the
/// permitted condition set and the terminal surface never drift apart.
pub fn select_command_definition(registry: &ConditionRegistry) -> Command {
    let mut command = Command::new("catalog-select").about("Display catalog files that apply");
    command = SelectStaticArgs::augment_args(command);
    for entry in registry.entries() {
        command = command.arg(
            Arg::new(entry.title)
                .long(entry.title)
                .short(entry.flag)
                .value_name("RANGE")
                .action(ArgAction::Set)
                // Open ranges such as `-20` lead with a hyphen.
                .allow_hyphen_values(true)
                .help(format!("{} (R)", entry.description)),
        );
    }
    command
}

pub fn collect_select_command(registry: &ConditionRegistry) -> Result<SelectFilesCommand> {
    let matches = select_command_definition(registry).get_matches();
    select_command_from_matches(&matches, registry)
}

fn select_command_from_matches(
    matches: &ArgMatches,
    registry: &ConditionRegistry,
) -> Result<SelectFilesCommand> {
    let statics = SelectStaticArgs::from_arg_matches(matches)?;

    let comment_status = resolve_comment_status(
        statics.comment_state,
        statics.comment_required,
        statics.comment_uncontrolled,
    )?;

    let mut print_level = statics.print_level;
    if print_level > 2 {
        return Err(anyhow!(
            "Printing level {print_level} is so high that no columns will be displayed"
        ));
    }
    if print_level < -1 {
        println!(
            "{}",
            style(format!(
                "Warning... Printing level {print_level} is unreasonably low, using -1"
            ))
            .yellow()
        );
        print_level = -1;
    }

    let mut conditions = Vec::new();
    for entry in registry.entries() {
        let Some(value) = matches.get_one::<String>(entry.title) else {
            continue;
        };
        let hint = format!("{}={}", entry.title, value);
        match Condition::parse(&hint, registry) {
            Ok(condition) if condition.is_ready() => conditions.push(condition),
            Ok(_) => tracing::warn!(hint = %hint, "condition dropped: no usable range"),
            Err(error) => {
                println!(
                    "{}",
                    style(format!("Dropping condition `{hint}`: {error}")).yellow()
                );
            }
        }
    }

    let (output_path, suppress_stdout) = match (statics.output, statics.redirect) {
        (Some(path), None) => (Some(path), false),
        (None, Some(path)) => (Some(path), true),
        _ => (None, false),
    };

    let settings = statics.general.resolve(true)?;

    Ok(SelectFilesCommand {
        settings,
        conditions,
        comment_status,
        file_hints: build_file_hints(&statics.filename),
        print_level,
        output_path,
        suppress_stdout,
    })
}

fn resolve_comment_status(
    state: i32,
    required: bool,
    uncontrolled: bool,
) -> Result<CommentStatus> {
    if !(0..=2).contains(&state) {
        return Err(anyhow!(
            "Status of comment shall be 0, 1, or 2 while {state} received"
        ));
    }

    let index = if state == 0 {
        if required {
            1
        } else if uncontrolled {
            2
        } else {
            0
        }
    } else if state == 2 && required {
        return Err(anyhow!(
            "`comment-state` places no limit while `comment-required` is present"
        ));
    } else if state == 1 && uncontrolled {
        return Err(anyhow!(
            "`comment-state` insists on comments while `comment-uncontrolled` is present"
        ));
    } else {
        state
    };

    CommentStatus::from_index(index)
        .ok_or_else(|| anyhow!("Status of comment shall be 0, 1, or 2 while {index} received"))
}

/// `*` becomes the SQL wildcard; several hints OR-join into one term.
fn build_file_hints(hints: &[String]) -> String {
    let rendered: Vec<String> = hints
        .iter()
        .filter(|hint| !hint.is_empty())
        .map(|hint| {
            if hint.contains('*') {
                format!("lfn like '{}'", hint.replace('*', "%"))
            } else {
                format!("lfn = '{hint}'")
            }
        })
        .collect();
    if rendered.len() != hints.len() {
        println!("{}", style("Warning... Trivial file name received...").yellow());
    }

    match rendered.len() {
        0 => String::new(),
        1 => rendered.into_iter().next().unwrap_or_default(),
        _ => format!("({})", rendered.join(" or ")),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "catalog-operate",
    about = "Catalog mutation handler (operator account required)"
)]
pub struct OperateArgs {
    #[command(flatten)]
    general: GeneralArgs,
    /// Name of a JSON file with one record object (or list) per line
    #[arg(long, short = 'j')]
    json_file: Option<PathBuf>,
    /// Read the record from the terminal (piped input works too)
    #[arg(long, short = 'd', conflicts_with = "json_file")]
    direct_input: bool,
    /// Insert (1, default) / update (2) / delete (3)
    #[arg(long, short = 'M', default_value_t = 1)]
    mode: i32,
    /// Switch to delete mode
    #[arg(long, conflicts_with = "update_mode")]
    delete_mode: bool,
    /// Switch to update mode
    #[arg(long)]
    update_mode: bool,
    /// Allow records routed to different tables within one batch
    #[arg(long)]
    multi_tables: bool,
    /// Logical file name
    #[arg(long, short = 'f')]
    lfn: Option<String>,
    /// Timestamp of the last event
    #[arg(long, short = 'e')]
    tstop: Option<String>,
    /// Timestamp of the first event
    #[arg(long, short = 'b')]
    tstart: Option<String>,
    /// Size of this file (unit: B)
    #[arg(long, short = 's')]
    size: Option<String>,
    /// Number of events
    #[arg(long, short = 'n')]
    nevts: Option<String>,
    /// Revision of the production software
    #[arg(long = "SvnRev", short = 'v')]
    svn_rev: Option<String>,
    /// Version of the production software
    #[arg(long, short = 'V')]
    version: Option<String>,
    /// Comment of this file
    #[arg(long, short = 'c')]
    comment: Option<String>,
    /// Highest energy in the file
    #[arg(long, short = 'H')]
    emax: Option<String>,
    /// Lowest energy in the file
    #[arg(long, short = 'L')]
    emin: Option<String>,
    /// Time of last modification ("YYYYmmdd-HHMMSS")
    #[arg(long, short = 'l')]
    last_modified: Option<String>,
    /// Expected checksum of the file (observation data only)
    #[arg(long, short = 'C')]
    checksum: Option<String>,
}

impl OperateArgs {
    fn column_pairs(&self) -> BTreeMap<String, String> {
        let items: [(&str, &Option<String>); 12] = [
            ("lfn", &self.lfn),
            ("tstop", &self.tstop),
            ("tstart", &self.tstart),
            ("size", &self.size),
            ("nevts", &self.nevts),
            ("SvnRev", &self.svn_rev),
            ("version", &self.version),
            ("comment", &self.comment),
            ("emax", &self.emax),
            ("emin", &self.emin),
            ("last_modified", &self.last_modified),
            ("checksum", &self.checksum),
        ];

        let mut pairs = BTreeMap::new();
        for (key, value) in items {
            if let Some(value) = value {
                pairs.insert(key.to_string(), value.clone());
            }
        }
        pairs
    }
}

pub fn collect_operate_command() -> Result<OperateCatalogCommand> {
    build_operate_command(OperateArgs::parse())
}

fn build_operate_command(args: OperateArgs) -> Result<OperateCatalogCommand> {
    let mode = resolve_mode(args.mode, args.update_mode, args.delete_mode)?;

    let mut pairs = args.column_pairs();
    let source = if let Some(path) = &args.json_file {
        if !pairs.is_empty() {
            return Err(anyhow!(
                "`json-file` excludes the per-column record options"
            ));
        }
        RecordSource::JsonFile(path.clone())
    } else if args.direct_input {
        RecordSource::DirectInput
    } else {
        if pairs.is_empty() {
            return Err(anyhow!(
                "Nothing to operate on; a JSON file, terminal input, or per-column options are necessary"
            ));
        }
        if !pairs.contains_key("lfn") {
            return Err(anyhow!(
                "A logical file name is necessary with per-column options"
            ));
        }
        // A NULL-ish comment marks the record as flagged.
        if pairs
            .get("comment")
            .is_some_and(|comment| {
                comment.eq_ignore_ascii_case("null") || comment.eq_ignore_ascii_case("none")
            })
        {
            pairs.insert("error_code".to_string(), "1".to_string());
        }
        RecordSource::ColumnOptions(pairs)
    };

    let settings = args.general.resolve(false)?;

    Ok(OperateCatalogCommand {
        settings,
        mode,
        multi_tables: args.multi_tables,
        source,
    })
}

fn resolve_mode(mode: i32, update_mode: bool, delete_mode: bool) -> Result<OperationMode> {
    let mut resolved = mode;
    for (enabled, index, name) in [
        (update_mode, 2, "update-mode"),
        (delete_mode, 3, "delete-mode"),
    ] {
        if !enabled {
            continue;
        }
        if resolved != 1 && resolved != index {
            return Err(anyhow!(
                "Collision detected: mode = {resolved} and `{name}` both received"
            ));
        }
        resolved = index;
    }

    OperationMode::from_index(resolved)
        .ok_or_else(|| anyhow!("Invalid operation mode: {resolved}"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::domain::condition::CommentStatus;
    use crate::domain::registry::ConditionRegistry;
    use crate::infrastructure::statement::OperationMode;

    #[test]
    fn every_registry_title_is_a_long_option() {
        let registry = ConditionRegistry::standard();
        let command = select_command_definition(&registry);

        for entry in registry.entries() {
            assert!(
                command
                    .get_arguments()
                    .any(|arg| arg.get_id().as_str() == entry.title),
                "missing option for {}",
                entry.title
            );
        }
    }

    #[test]
    fn select_matches_turn_into_ready_conditions() {
        let registry = ConditionRegistry::standard();
        let matches = select_command_definition(&registry)
            .try_get_matches_from([
                "catalog-select",
                "-S",
                "db.local",
                "-D",
                "catalog",
                "-T",
                "mc_simu_tbl",
                "--size",
                "10-20",
                "--energy",
                "5",
            ])
            .expect("arguments should parse");

        let command = select_command_from_matches(&matches, &registry)
            .expect("command should be created");

        assert_eq!(command.conditions.len(), 2);
        assert_eq!(command.settings.user, "anonymous");
        assert_eq!(command.comment_status, CommentStatus::WithoutOnly);
    }

    #[test]
    fn unusable_conditions_are_dropped_not_fatal() {
        let registry = ConditionRegistry::standard();
        let matches = select_command_definition(&registry)
            .try_get_matches_from([
                "catalog-select",
                "-S",
                "db.local",
                "-D",
                "catalog",
                "-T",
                "mc_simu_tbl",
                "--energy",
                "---",
            ])
            .expect("arguments should parse");

        let command = select_command_from_matches(&matches, &registry)
            .expect("command should be created");

        assert!(command.conditions.is_empty());
    }

    #[test]
    fn comment_state_contradictions_are_detected() {
        assert!(matches!(
            resolve_comment_status(0, false, false),
            Ok(CommentStatus::WithoutOnly)
        ));
        assert!(matches!(
            resolve_comment_status(0, true, false),
            Ok(CommentStatus::WithOnly)
        ));
        assert!(matches!(
            resolve_comment_status(0, false, true),
            Ok(CommentStatus::Unlimited)
        ));
        assert!(resolve_comment_status(2, true, false).is_err());
        assert!(resolve_comment_status(1, false, true).is_err());
        assert!(resolve_comment_status(4, false, false).is_err());
    }

    #[test]
    fn file_hints_render_equality_wildcards_and_disjunction() {
        assert_eq!(build_file_hints(&[]), "");
        assert_eq!(
            build_file_hints(&["a.mc.root".to_string()]),
            "lfn = 'a.mc.root'"
        );
        assert_eq!(
            build_file_hints(&["*.mc.root".to_string()]),
            "lfn like '%.mc.root'"
        );
        assert_eq!(
            build_file_hints(&["a.mc.root".to_string(), "*.reco.root".to_string()]),
            "(lfn = 'a.mc.root' or lfn like '%.reco.root')"
        );
    }

    #[test]
    fn mode_switches_override_and_collide() {
        assert_eq!(
            resolve_mode(1, false, false).expect("mode should resolve"),
            OperationMode::Insert
        );
        assert_eq!(
            resolve_mode(1, true, false).expect("mode should resolve"),
            OperationMode::Update
        );
        assert_eq!(
            resolve_mode(3, false, true).expect("mode should resolve"),
            OperationMode::Delete
        );
        assert!(resolve_mode(2, false, true).is_err());
        assert!(resolve_mode(7, false, false).is_err());
    }

    #[test]
    fn per_column_options_become_one_record_source() {
        let args = OperateArgs::try_parse_from([
            "catalog-operate",
            "-S",
            "db.local",
            "-U",
            "operator",
            "-W",
            "secret",
            "-D",
            "catalog",
            "-T",
            "mc_simu_tbl",
            "--lfn",
            "a.mc.root",
            "--comment",
            "NULL",
        ])
        .expect("arguments should parse");

        let command = build_operate_command(args).expect("command should be created");

        let RecordSource::ColumnOptions(pairs) = command.source else {
            panic!("expected per-column source");
        };
        assert_eq!(pairs.get("lfn").map(String::as_str), Some("a.mc.root"));
        assert_eq!(pairs.get("error_code").map(String::as_str), Some("1"));
        assert_eq!(command.mode, OperationMode::Insert);
    }

    #[test]
    fn json_file_excludes_per_column_options() {
        let args = OperateArgs::try_parse_from([
            "catalog-operate",
            "-S",
            "db.local",
            "-U",
            "operator",
            "-W",
            "secret",
            "-D",
            "catalog",
            "-T",
            "mc_simu_tbl",
            "--json-file",
            "records.json",
            "--lfn",
            "a.mc.root",
        ])
        .expect("arguments should parse");

        let error =
            build_operate_command(args).expect_err("mixed record sources should be rejected");
        assert!(error.to_string().contains("json-file"));
    }

    #[test]
    fn per_column_input_requires_an_lfn() {
        let args = OperateArgs::try_parse_from([
            "catalog-operate",
            "-S",
            "db.local",
            "-U",
            "operator",
            "-W",
            "secret",
            "-D",
            "catalog",
            "-T",
            "mc_simu_tbl",
            "--size",
            "5",
        ])
        .expect("arguments should parse");

        let error = build_operate_command(args).expect_err("missing lfn should be rejected");
        assert!(error.to_string().contains("logical file name"));
    }
}
