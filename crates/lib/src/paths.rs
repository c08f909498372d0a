use std::path::{Path, PathBuf};

use nix::unistd::getuid;

/// Uid of the user the editor runs as.
///
/// Under `sudo` this is the invoking user (`SUDO_UID`), otherwise the owner of
/// the real uid of the current process.
pub fn user_id() -> u32 {
    let sudo_uid = std::env::var("SUDO_UID").ok();
    resolve_user_id(sudo_uid.as_deref(), process_uid())
}

fn process_uid() -> u32 {
    getuid().as_raw()
}

fn resolve_user_id(sudo_uid: Option<&str>, process_uid: u32) -> u32 {
    sudo_uid
        .and_then(|uid| uid.trim().parse().ok())
        .unwrap_or(process_uid)
}

/// Socket the editor listens on for `uid` (/tmp/textmate-<uid>.sock)
pub fn socket_path_for(uid: u32) -> PathBuf {
    PathBuf::from(format!("/tmp/textmate-{uid}.sock"))
}

/// Get the editor socket path for the current user
pub fn socket_path() -> PathBuf {
    socket_path_for(user_id())
}

/// Make a command-line path absolute against `cwd`.
///
/// `-` (stdin) and `uuid://` references are returned unchanged.
pub fn absolutize(arg: &str, cwd: &Path) -> String {
    if arg == "-" || arg.starts_with(crate::protocol::UUID_PREFIX) || Path::new(arg).is_absolute()
    {
        return arg.to_string();
    }
    format!("{}/{}", cwd.display(), arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sudo_uid_takes_precedence() {
        assert_eq!(resolve_user_id(Some("501"), 0), 501);
        assert_eq!(resolve_user_id(None, 1000), 1000);
        assert_eq!(resolve_user_id(Some("not-a-number"), 1000), 1000);
    }

    #[test]
    fn process_uid_owns_new_files() {
        use std::os::unix::fs::MetadataExt;

        let file = tempfile::NamedTempFile::new().unwrap();
        let owner = file.as_file().metadata().unwrap().uid();
        assert_eq!(process_uid(), owner);
    }

    #[test]
    fn socket_path_format() {
        assert_eq!(
            socket_path_for(501),
            PathBuf::from("/tmp/textmate-501.sock")
        );
    }

    #[test]
    fn absolutize_relative_paths() {
        let cwd = Path::new("/home/me/project");
        assert_eq!(absolutize("src/main.rs", cwd), "/home/me/project/src/main.rs");
        assert_eq!(absolutize("/etc/hosts", cwd), "/etc/hosts");
        assert_eq!(absolutize("-", cwd), "-");
        assert_eq!(absolutize("uuid://ABC", cwd), "uuid://ABC");
    }
}
