//! Loading of configuration split across several files.
//!
//! The entry file may declare `include = "file.toml"` or an array of files.
//! Included files are merged section by section; a top-level section may only
//! be defined once across the whole set.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
	/// Directory relative includes are resolved against
	base_path: PathBuf,
	/// Canonical paths already read, for circular include detection
	loaded_files: HashSet<PathBuf>,
	/// Section name -> file that defined it
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	/// Loads a configuration file and all its includes, then validates the
	/// merged result.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;

		let main_content = self.load_file(&config_path).await?;
		let main_toml: toml::Value = toml::from_str(&main_content)?;

		let includes = Self::extract_includes(&main_toml)?;
		if includes.is_empty() {
			return main_content.parse();
		}

		let combined = self.merge_includes(main_toml, includes, config_path).await?;
		let combined_str = toml::to_string(&combined).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		combined_str.parse()
	}

	/// Reads a file and substitutes environment variables.
	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical_path = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;

		if !self.loaded_files.insert(canonical_path.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical_path.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	fn extract_includes(toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
		let Some(include_value) = toml.get("include") else {
			return Ok(Vec::new());
		};

		if let Some(path_str) = include_value.as_str() {
			return Ok(vec![PathBuf::from(path_str)]);
		}

		let array = include_value.as_array().ok_or_else(|| {
			ConfigError::Validation("Include must be a string or array of strings".into())
		})?;
		array
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect()
	}

	async fn merge_includes(
		&mut self,
		mut main_toml: toml::Value,
		includes: Vec<PathBuf>,
		main_file_path: PathBuf,
	) -> Result<toml::Value, ConfigError> {
		let main_table = main_toml
			.as_table_mut()
			.ok_or_else(|| ConfigError::Parse("Configuration root must be a table".into()))?;
		main_table.remove("include");

		for key in main_table.keys() {
			self.section_sources
				.insert(key.clone(), main_file_path.clone());
		}

		for include_path in includes {
			let resolved_path = self.resolve_path(&include_path)?;
			let include_content = self.load_file(&resolved_path).await?;
			let include_toml: toml::Value = toml::from_str(&include_content)?;

			let Some(include_table) = include_toml.as_table() else {
				continue;
			};

			for (key, value) in include_table {
				if let Some(existing_source) = self.section_sources.get(key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						existing_source.display(),
						resolved_path.display()
					)));
				}
				self.section_sources
					.insert(key.clone(), resolved_path.clone());
				main_table.insert(key.clone(), value.clone());
			}
		}

		Ok(main_toml)
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();

		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}
