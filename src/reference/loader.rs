use std::path::Path;

use super::embedded::{embedded_reference, embedded_references};
use super::manifest::GenreReference;
use crate::MixgradeError;

/// Names of the built-in genre references.
pub fn list_genres() -> Vec<String> {
    let mut names: Vec<String> = embedded_references()
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    names.sort();
    names
}

/// Load a reference by built-in genre name or by path to a JSON document.
pub fn load_reference(name_or_path: &str) -> crate::Result<GenreReference> {
    let path = Path::new(name_or_path);
    if path.is_file() {
        let json = std::fs::read_to_string(path).map_err(|e| {
            MixgradeError::config(format!("failed to read reference {}: {e}", path.display()))
        })?;
        let reference = GenreReference::from_json(&json)?;
        log::info!("Loaded genre reference '{}' from {}", reference.genre, path.display());
        return Ok(reference);
    }

    let json = embedded_reference(name_or_path).ok_or_else(|| {
        MixgradeError::config(format!(
            "Genre '{}' not found. Available genres: {:?}",
            name_or_path,
            list_genres()
        ))
    })?;
    GenreReference::from_json(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_embedded_reference_validates() {
        for name in list_genres() {
            let reference = load_reference(&name).unwrap();
            assert_eq!(reference.genre, name);
            assert_eq!(reference.bands.len(), 7);
            for band in &reference.bands {
                assert!(reference.group_of(&band.id).is_some(), "{name}/{}", band.id);
            }
        }
    }

    #[test]
    fn unknown_genre_lists_alternatives() {
        let err = load_reference("polka").unwrap_err();
        assert!(matches!(err, MixgradeError::Configuration(_)));
        assert!(err.to_string().contains("pop"));
    }

    #[test]
    fn loads_from_path() {
        let dir = std::env::temp_dir().join(format!("mixgrade-ref-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("custom.json");
        let json = embedded_reference("rock").unwrap().replace("\"rock\"", "\"custom\"");
        std::fs::write(&path, json).unwrap();

        let reference = load_reference(path.to_str().unwrap()).unwrap();
        assert_eq!(reference.genre, "custom");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
