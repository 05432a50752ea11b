use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::grid::DEFAULT_DISPLAY_LIMIT;
use crate::state::InitialSelection;

pub const DISPLAY_LIMIT_KEY: &str =
  "calendar.display_limit";
pub const INITIAL_SELECTION_KEY: &str =
  "calendar.initial_selection";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.nota".to_string()
    );
    map.insert(
      "default.command".to_string(),
      "month".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    map.insert(
      DISPLAY_LIMIT_KEY.to_string(),
      DEFAULT_DISPLAY_LIMIT.to_string()
    );
    map.insert(
      INITIAL_SELECTION_KEY.to_string(),
      "empty".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    notarc_override
  ))]
  pub fn load(
    notarc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let notarc = resolve_notarc_path(
      notarc_override
    )?;
    if let Some(path) = notarc {
      info!(notarc = %path.display(), "loading notarc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no notarc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Events shown per grid cell before
  /// the rest collapse into "+N more".
  pub fn display_limit(
    &self
  ) -> anyhow::Result<usize> {
    let Some(raw) =
      self.map.get(DISPLAY_LIMIT_KEY)
    else {
      return Ok(DEFAULT_DISPLAY_LIMIT);
    };

    let limit = raw
      .trim()
      .parse::<usize>()
      .with_context(|| {
        format!(
          "invalid \
           {DISPLAY_LIMIT_KEY}: {raw}"
        )
      })?;
    if limit == 0 {
      return Err(anyhow!(
        "{DISPLAY_LIMIT_KEY} must be \
         at least 1"
      ));
    }
    Ok(limit)
  }

  pub fn initial_selection(
    &self
  ) -> anyhow::Result<InitialSelection>
  {
    self
      .map
      .get(INITIAL_SELECTION_KEY)
      .map(|raw| {
        raw.parse::<InitialSelection>()
      })
      .unwrap_or(Ok(
        InitialSelection::Empty
      ))
      .with_context(|| {
        format!(
          "invalid \
           {INITIAL_SELECTION_KEY}"
        )
      })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
          file = %path.display(),
          include = %include_path.display(),
          line = line_num + 1,
          "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_notarc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(notarc_env) =
    std::env::var("NOTARC")
  {
    if notarc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      notarc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping notarc"
    );
    return Ok(None);
  };
  let candidate = home.join(".notarc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".nota"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;

  #[test]
  fn defaults_cover_calendar_keys() {
    let cfg = Config::default();
    assert_eq!(
      cfg.display_limit()
        .expect("limit"),
      DEFAULT_DISPLAY_LIMIT
    );
    assert_eq!(
      cfg
        .initial_selection()
        .expect("selection"),
      InitialSelection::Empty
    );
    assert_eq!(
      cfg.get("default.command"),
      Some("month".to_string())
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(true)
    );
  }

  #[test]
  fn overrides_replace_file_values() {
    let mut cfg = Config::default();
    cfg.apply_overrides([
      (
        "rc.calendar.display_limit"
          .to_string(),
        "2".to_string()
      ),
      (
        INITIAL_SELECTION_KEY
          .to_string(),
        "today".to_string()
      )
    ]);
    assert_eq!(
      cfg.display_limit()
        .expect("limit"),
      2
    );
    assert_eq!(
      cfg
        .initial_selection()
        .expect("selection"),
      InitialSelection::Today
    );
  }

  #[test]
  fn zero_or_garbage_limits_are_rejected(
  ) {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      DISPLAY_LIMIT_KEY.to_string(),
      "0".to_string()
    )]);
    assert!(cfg.display_limit().is_err());

    cfg.apply_overrides([(
      DISPLAY_LIMIT_KEY.to_string(),
      "three".to_string()
    )]);
    assert!(cfg.display_limit().is_err());
  }

  #[test]
  fn notarc_supports_comments_and_includes(
  ) {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &extra,
      "calendar.initial_selection = today\n"
    )
    .expect("write include");

    let main = temp.path().join("notarc");
    fs::write(
      &main,
      "# calendar settings\n\
       calendar.display_limit = 2 # fewer bars\n\
       include extra.rc\n\
       include missing.rc\n"
    )
    .expect("write notarc");

    let cfg = Config::load(Some(&main))
      .expect("load notarc");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.display_limit()
        .expect("limit"),
      2
    );
    assert_eq!(
      cfg
        .initial_selection()
        .expect("selection"),
      InitialSelection::Today
    );
  }

  #[test]
  fn lines_without_equals_are_errors() {
    let temp = tempfile::tempdir()
      .expect("tempdir");
    let main = temp.path().join("notarc");
    fs::write(&main, "color on\n")
      .expect("write notarc");
    assert!(
      Config::load(Some(&main)).is_err()
    );
  }
}
