use std::fs;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

use crate::infrastructure::database::{
    ConnectionSettings, DEFAULT_ACCOUNT, DEFAULT_PASSWORD,
};

const DEFAULT_PORT: u16 = 3306;

/// Connection parameters as they trickle in from the settings file and the
/// terminal; the terminal wins. `finish` turns the draft into a usable
/// `ConnectionSettings` or explains what is missing.
#[derive(Debug, Clone, Default)]
pub struct ConnectionDraft {
    pub server: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub table: Option<String>,
    pub port: Option<u16>,
}

impl ConnectionDraft {
    pub fn finish(self, allow_default_account: bool) -> Result<ConnectionSettings> {
        self.finish_with(allow_default_account, interactive_password)
    }

    fn finish_with(
        self,
        allow_default_account: bool,
        prompt: impl FnOnce() -> Result<String>,
    ) -> Result<ConnectionSettings> {
        let user = self.user.unwrap_or_else(|| DEFAULT_ACCOUNT.to_string());

        let password = if user == DEFAULT_ACCOUNT {
            // The read-only account always pairs with its fixed password.
            DEFAULT_PASSWORD.to_string()
        } else {
            match self.password {
                Some(password) if !password.is_empty() => password,
                _ => prompt()?,
            }
        };

        if !allow_default_account && user == DEFAULT_ACCOUNT {
            return Err(anyhow!(
                "The default read-only account cannot modify the catalog"
            ));
        }

        let server = self.server.ok_or_else(|| anyhow!("Unavailable server"))?;
        let database = self
            .database
            .ok_or_else(|| anyhow!("Unavailable database"))?;
        let table = self.table.ok_or_else(|| anyhow!("Unavailable table"))?;

        Ok(ConnectionSettings {
            server,
            user,
            password,
            database,
            table,
            port: self.port.unwrap_or(DEFAULT_PORT),
        })
    }
}

fn interactive_password() -> Result<String> {
    let password = dialoguer::Password::new()
        .with_prompt("Enter password")
        .interact()?;
    Ok(password)
}

/// Fill draft fields from a `key=value` settings file. Recognized keys:
/// server, user, passwd, database, type (the table), port.
pub fn ingest_options_file(draft: &mut ConnectionDraft, requested: &str) {
    if requested.is_empty() {
        tracing::warn!("empty name for the settings file");
        return;
    }

    let Some(path) = locate_options_file(requested) else {
        tracing::warn!(requested, "cannot locate the settings file");
        return;
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(error) => {
            tracing::warn!(%error, path = %path.display(), "cannot open the settings file");
            return;
        }
    };

    for line in content.lines() {
        if line.len() < 3 {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        match key.as_str() {
            "server" => draft.server = Some(value.to_string()),
            "user" => draft.user = Some(value.to_string()),
            "passwd" => draft.password = Some(value.to_string()),
            "database" => draft.database = Some(value.to_string()),
            "type" => draft.table = Some(value.to_string()),
            "port" => match value.parse::<u16>() {
                Ok(port) => draft.port = Some(port),
                Err(_) => tracing::warn!(value, "unreadable port in the settings file"),
            },
            _ => tracing::debug!(line, "unrecognized settings line"),
        }
    }
}

/// The given path, then its basename in the current folder, then the
/// basename under `$HOME`.
fn locate_options_file(requested: &str) -> Option<PathBuf> {
    let direct = PathBuf::from(requested);
    if direct.is_file() {
        return Some(direct);
    }

    let basename = direct.file_name()?;
    let local = PathBuf::from(basename);
    if local != direct && local.is_file() {
        tracing::info!("settings file in the current folder selected");
        return Some(local);
    }

    let home = std::env::var_os("HOME")?;
    let in_home = PathBuf::from(home).join(basename);
    if in_home.is_file() {
        tracing::info!("settings file in HOME selected");
        return Some(in_home);
    }

    None
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::{ConnectionDraft, ingest_options_file};
    use crate::infrastructure::database::{DEFAULT_ACCOUNT, DEFAULT_PASSWORD};

    fn build_temp_settings_file(content: &str) -> PathBuf {
        let unique_suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("catalog_settings_{unique_suffix}.conf"));
        fs::write(&path, content).expect("temp settings file should be written");
        path
    }

    #[test]
    fn settings_file_fills_the_draft() {
        let path = build_temp_settings_file(
            "server=10.0.0.7\nuser=operator\npasswd=secret\ndatabase=catalog\ntype=mc_simu_tbl\nport=3307\n",
        );

        let mut draft = ConnectionDraft::default();
        ingest_options_file(&mut draft, path.to_str().expect("temp path should be utf8"));

        assert_eq!(draft.server.as_deref(), Some("10.0.0.7"));
        assert_eq!(draft.user.as_deref(), Some("operator"));
        assert_eq!(draft.password.as_deref(), Some("secret"));
        assert_eq!(draft.database.as_deref(), Some("catalog"));
        assert_eq!(draft.table.as_deref(), Some("mc_simu_tbl"));
        assert_eq!(draft.port, Some(3307));

        fs::remove_file(path).expect("temp settings file should be removed");
    }

    #[test]
    fn unreadable_lines_are_skipped() {
        let path = build_temp_settings_file("# note\nserver=db.local\nport=notanumber\nnoise\n");

        let mut draft = ConnectionDraft::default();
        ingest_options_file(&mut draft, path.to_str().expect("temp path should be utf8"));

        assert_eq!(draft.server.as_deref(), Some("db.local"));
        assert_eq!(draft.port, None);

        fs::remove_file(path).expect("temp settings file should be removed");
    }

    #[test]
    fn default_account_gets_the_default_password() {
        let draft = ConnectionDraft {
            server: Some("db.local".to_string()),
            database: Some("catalog".to_string()),
            table: Some("mc_simu_tbl".to_string()),
            ..ConnectionDraft::default()
        };

        let settings = draft
            .finish_with(true, || panic!("no prompt expected"))
            .expect("draft should finish");

        assert_eq!(settings.user, DEFAULT_ACCOUNT);
        assert_eq!(settings.password, DEFAULT_PASSWORD);
        assert_eq!(settings.port, 3306);
    }

    #[test]
    fn missing_password_on_a_real_account_prompts() {
        let draft = ConnectionDraft {
            server: Some("db.local".to_string()),
            user: Some("operator".to_string()),
            database: Some("catalog".to_string()),
            table: Some("mc_simu_tbl".to_string()),
            ..ConnectionDraft::default()
        };

        let settings = draft
            .finish_with(false, || Ok("prompted".to_string()))
            .expect("draft should finish");

        assert_eq!(settings.password, "prompted");
    }

    #[test]
    fn mutations_refuse_the_default_account() {
        let draft = ConnectionDraft {
            server: Some("db.local".to_string()),
            database: Some("catalog".to_string()),
            table: Some("mc_simu_tbl".to_string()),
            ..ConnectionDraft::default()
        };

        let error = draft
            .finish_with(false, || panic!("no prompt expected"))
            .expect_err("default account should be refused");
        assert!(error.to_string().contains("read-only account"));
    }

    #[test]
    fn missing_server_is_reported() {
        let draft = ConnectionDraft {
            database: Some("catalog".to_string()),
            table: Some("mc_simu_tbl".to_string()),
            ..ConnectionDraft::default()
        };

        let error = draft
            .finish_with(true, || panic!("no prompt expected"))
            .expect_err("missing server should be reported");
        assert!(error.to_string().contains("server"));
    }
}
