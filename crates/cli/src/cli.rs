//! Command-line arguments and their translation into a request batch

use std::path::{Path, PathBuf};

use clap::Parser;
use libmate::protocol::UUID_PREFIX;
use libmate::{DocumentRequest, Source, Toggle};

const AFTER_HELP: &str = "\
By default mate will wait for files to be closed if the command name
has a \"_wait\" suffix (e.g. via a symbolic link) or when used as a
filter like in these examples:

    ls *.tex|mate|sh      -w implied
    mate -|cat -n         -w implied (read from stdin)";

/// Open files and piped input in a running editor
#[derive(Debug, Parser)]
#[command(
    name = "mate",
    version,
    about,
    after_help = AFTER_HELP,
    disable_version_flag = true
)]
pub struct Cli {
    /// Wait for file to be closed by the editor
    #[arg(short, long, overrides_with_all = ["no_wait", "no_wait_async"])]
    pub wait: bool,

    /// Do not wait for file to be closed
    #[arg(long, overrides_with_all = ["wait", "no_wait_async"])]
    pub no_wait: bool,

    /// Same as --no-wait
    #[arg(short = 'a', long = "async", overrides_with_all = ["wait", "no_wait"])]
    pub no_wait_async: bool,

    /// Place caret on line <NUMBER> after loading file
    #[arg(short = 'l', long = "line", value_name = "NUMBER")]
    pub lines: Vec<String>,

    /// Treat file as having <FILETYPE>
    #[arg(short = 't', long = "type", value_name = "FILETYPE")]
    pub types: Vec<String>,

    /// The display name shown in the editor
    #[arg(short = 'm', long = "name")]
    pub names: Vec<String>,

    /// Project the file belongs to
    #[arg(short = 'p', long = "project", value_name = "UUID")]
    pub projects: Vec<String>,

    /// Add file to Open Recent menu
    #[arg(short, long, overrides_with = "no_recent")]
    pub recent: bool,

    /// Do not add file to Open Recent menu
    #[arg(long, overrides_with = "recent")]
    pub no_recent: bool,

    /// Change the editor's working directory to that of the file
    #[arg(short = 'd', long)]
    pub change_dir: bool,

    /// Reference an already open document using its UUID
    #[arg(short, long)]
    pub uuid: Option<String>,

    /// Preserve ANSI escapes read from stdin
    #[arg(short, long, overrides_with = "no_escapes")]
    pub escapes: bool,

    /// Strip ANSI escapes read from stdin without a warning
    #[arg(long, overrides_with = "escapes")]
    pub no_escapes: bool,

    /// More log output (repeatable)
    #[arg(long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print version information
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: (),

    /// Files to open, `-` reads stdin
    pub files: Vec<String>,
}

fn toggle(enable: bool, disable: bool) -> Toggle {
    if enable {
        Toggle::Enable
    } else if disable {
        Toggle::Disable
    } else {
        Toggle::Unset
    }
}

/// Split a comma-separated option value; a trailing comma adds nothing
pub fn split_list(value: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = value;
    while !rest.is_empty() {
        match rest.split_once(',') {
            Some((item, tail)) => {
                out.push(item.to_string());
                rest = tail;
            }
            None => {
                out.push(rest.to_string());
                break;
            }
        }
    }
    out
}

fn flatten(values: &[String]) -> Vec<String> {
    values.iter().flat_map(|v| split_list(v)).collect()
}

/// Invoked through a name like `mate_wait`
pub fn invoked_as_wait(program: &Path) -> bool {
    program
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.len() > 5 && name.ends_with("_wait"))
}

/// Everything the batch depends on besides the arguments
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub program: PathBuf,
    pub stdin_is_pipe: bool,
    /// `TM_PROJECT_UUID`
    pub env_project: Option<String>,
}

/// The request batch an invocation asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub documents: Vec<DocumentRequest>,
    pub default_project: Option<String>,
    pub keep_escapes: Toggle,
}

impl Plan {
    pub fn reads_stdin(&self) -> bool {
        self.documents.iter().any(|d| d.source == Source::Stdin)
    }
}

impl Cli {
    pub fn wait(&self, invocation: &Invocation) -> Toggle {
        let flag = toggle(self.wait, self.no_wait || self.no_wait_async);
        if !flag.is_set() && invoked_as_wait(&invocation.program) {
            Toggle::Enable
        } else {
            flag
        }
    }

    pub fn keep_escapes(&self) -> Toggle {
        toggle(self.escapes, self.no_escapes)
    }

    /// Resolve file arguments and per-file options into documents.
    ///
    /// `cwd` is only consulted for relative paths.
    pub fn plan<E>(
        &self,
        invocation: &Invocation,
        cwd: impl Fn() -> Result<PathBuf, E>,
    ) -> Result<Plan, E> {
        let wait = self.wait(invocation);
        let lines = flatten(&self.lines);
        let types = flatten(&self.types);
        let names = flatten(&self.names);
        let projects = flatten(&self.projects);

        let mut files = Vec::new();
        for arg in self.files.iter().filter(|f| !f.is_empty()) {
            if arg == "-" || arg.starts_with(UUID_PREFIX) || Path::new(arg).is_absolute() {
                files.push(arg.clone());
            } else {
                files.push(libmate::paths::absolutize(arg, &cwd()?));
            }
        }

        if files.is_empty() {
            if let Some(uuid) = &self.uuid {
                files.push(format!("{UUID_PREFIX}{uuid}"));
            } else if wait.is_enabled() || invocation.stdin_is_pipe {
                files.push("-".to_string());
            }
        }

        let documents = files
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let mut doc = DocumentRequest::new(Source::from_arg(file));
                doc.display_name = names.get(i).cloned();
                doc.selection = lines.get(i).cloned();
                doc.file_type = types.get(i).cloned();
                doc.project_uuid = projects.get(i).cloned();
                doc.wait = wait;
                doc.add_to_recents = toggle(self.recent, self.no_recent);
                doc.change_directory = toggle(self.change_dir, false);
                doc
            })
            .collect();

        let default_project = projects
            .last()
            .cloned()
            .or_else(|| invocation.env_project.clone());

        Ok(Plan {
            documents,
            default_project,
            keep_escapes: self.keep_escapes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mate").chain(args.iter().copied())).unwrap()
    }

    fn cwd() -> Result<PathBuf, Infallible> {
        Ok(PathBuf::from("/work"))
    }

    fn invocation() -> Invocation {
        Invocation {
            program: PathBuf::from("/usr/local/bin/mate"),
            ..Default::default()
        }
    }

    #[test]
    fn short_v_prints_version() {
        for flag in ["-v", "--version"] {
            let err = Cli::try_parse_from(["mate", flag]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        }
    }

    #[test]
    fn verbose_is_long_only() {
        assert_eq!(parse(&["--verbose", "--verbose"]).verbose, 2);
        let err = Cli::try_parse_from(["mate", "-V"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn split_list_like_getopt_append() {
        assert_eq!(split_list("1,2,3"), vec!["1", "2", "3"]);
        assert_eq!(split_list("a,,b"), vec!["a", "", "b"]);
        assert_eq!(split_list("a,"), vec!["a"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn wait_flags_last_one_wins() {
        let inv = invocation();
        assert_eq!(parse(&["-w"]).wait(&inv), Toggle::Enable);
        assert_eq!(parse(&["-w", "-a"]).wait(&inv), Toggle::Disable);
        assert_eq!(parse(&["--no-wait", "-w"]).wait(&inv), Toggle::Enable);
        assert_eq!(parse(&[]).wait(&inv), Toggle::Unset);
    }

    #[test]
    fn wait_suffix_implies_wait() {
        let inv = Invocation {
            program: PathBuf::from("/usr/local/bin/mate_wait"),
            ..Default::default()
        };
        assert_eq!(parse(&[]).wait(&inv), Toggle::Enable);
        assert_eq!(parse(&["--no-wait"]).wait(&inv), Toggle::Disable);
        assert!(!invoked_as_wait(Path::new("_wait")));
    }

    #[test]
    fn per_file_options_by_position() {
        let cli = parse(&[
            "-l", "10,20", "-t", "source.rust", "-m", "a", "-m", "b", "x.rs", "/abs/y.rs",
        ]);
        let plan = cli.plan(&invocation(), cwd).unwrap();
        assert_eq!(plan.documents.len(), 2);

        let first = &plan.documents[0];
        assert_eq!(first.source, Source::Path("/work/x.rs".into()));
        assert_eq!(first.selection.as_deref(), Some("10"));
        assert_eq!(first.file_type.as_deref(), Some("source.rust"));
        assert_eq!(first.display_name.as_deref(), Some("a"));

        let second = &plan.documents[1];
        assert_eq!(second.source, Source::Path("/abs/y.rs".into()));
        assert_eq!(second.selection.as_deref(), Some("20"));
        assert_eq!(second.file_type, None);
        assert_eq!(second.display_name.as_deref(), Some("b"));
    }

    #[test]
    fn empty_arguments_are_skipped() {
        let plan = parse(&["", "/a"]).plan(&invocation(), cwd).unwrap();
        assert_eq!(plan.documents.len(), 1);
    }

    #[test]
    fn cwd_only_needed_for_relative_paths() {
        let cli = parse(&["/abs", "-"]);
        let plan = cli
            .plan(&invocation(), || Err::<PathBuf, _>("no cwd"))
            .unwrap();
        assert_eq!(plan.documents[1].source, Source::Stdin);

        let cli = parse(&["relative"]);
        assert_eq!(
            cli.plan(&invocation(), || Err::<PathBuf, _>("no cwd")),
            Err("no cwd")
        );
    }

    #[test]
    fn uuid_used_without_files() {
        let plan = parse(&["-u", "ABCD"]).plan(&invocation(), cwd).unwrap();
        assert_eq!(plan.documents[0].source, Source::UuidRef("ABCD".into()));
    }

    #[test]
    fn stdin_implied_for_pipes_and_wait() {
        let piped = Invocation {
            stdin_is_pipe: true,
            ..invocation()
        };
        let plan = parse(&[]).plan(&piped, cwd).unwrap();
        assert_eq!(plan.documents, vec![DocumentRequest::stdin()]);

        let plan = parse(&["-w"]).plan(&invocation(), cwd).unwrap();
        assert!(plan.reads_stdin());

        let plan = parse(&[]).plan(&invocation(), cwd).unwrap();
        assert!(plan.documents.is_empty());
    }

    #[test]
    fn default_project_from_last_flag_or_env() {
        let inv = Invocation {
            env_project: Some("ENV".into()),
            ..invocation()
        };
        let plan = parse(&["-p", "P1,P2", "/a"]).plan(&inv, cwd).unwrap();
        assert_eq!(plan.default_project.as_deref(), Some("P2"));
        assert_eq!(plan.documents[0].project_uuid.as_deref(), Some("P1"));

        let plan = parse(&["/a"]).plan(&inv, cwd).unwrap();
        assert_eq!(plan.default_project.as_deref(), Some("ENV"));
    }

    #[test]
    fn boolean_options() {
        let plan = parse(&["-r", "-d", "-e", "/a"]).plan(&invocation(), cwd).unwrap();
        let doc = &plan.documents[0];
        assert_eq!(doc.add_to_recents, Toggle::Enable);
        assert_eq!(doc.change_directory, Toggle::Enable);
        assert_eq!(plan.keep_escapes, Toggle::Enable);

        let plan = parse(&["-r", "--no-recent", "--no-escapes", "/a"])
            .plan(&invocation(), cwd)
            .unwrap();
        assert_eq!(plan.documents[0].add_to_recents, Toggle::Disable);
        assert_eq!(plan.documents[0].change_directory, Toggle::Unset);
        assert_eq!(plan.keep_escapes, Toggle::Disable);
    }
}
