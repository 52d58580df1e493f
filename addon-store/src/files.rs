//! Small helpers for presenting addon contents.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// Presentation icon and semantic type for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileTypeInfo {
    pub icon: &'static str,
    pub kind: &'static str,
}

pub const GENERIC_FILE: FileTypeInfo = FileTypeInfo {
    icon: "page_white",
    kind: "unknown",
};

lazy_static! {
    static ref FILE_TYPES: HashMap<&'static str, FileTypeInfo> = {
        let table: &[(&[&'static str], &'static str, &'static str)] = &[
            (&["mdl", "vvd", "vtx", "phy", "ani"], "bricks", "mdl"),
            (&["vtf"], "picture", "vtf"),
            (&["vmt"], "palette", "vmt"),
            (&["png", "jpg", "jpeg"], "image", "image"),
            (&["lua"], "script", "lua"),
            (&["wav", "mp3", "ogg"], "sound", "sound"),
            (&["bsp"], "map", "bsp"),
            (&["nav", "ain"], "map", "nav"),
            (&["pcf"], "fire", "pcf"),
            (&["ttf", "otf"], "font", "font"),
            (&["txt", "json", "properties"], "page_white_text", "text"),
        ];

        let mut types = HashMap::new();
        for &(extensions, icon, kind) in table {
            for &extension in extensions {
                types.insert(extension, FileTypeInfo { icon, kind });
            }
        }
        types
    };
}

/// Classifies a file by the text after its last `.`, ignoring ASCII case.
/// Names without an extension, or with one we do not know, get [`GENERIC_FILE`].
pub fn file_type_info(file_name: &str) -> FileTypeInfo {
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return GENERIC_FILE;
    };

    FILE_TYPES
        .get(extension.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or(GENERIC_FILE)
}

/// Strips trailing `/` and `\` separators. A path consisting only of
/// separators keeps its first one, so the root is not turned into "".
pub fn trim_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() && !path.is_empty() {
        &path[..1]
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(
            file_type_info("model.mdl"),
            FileTypeInfo {
                icon: "bricks",
                kind: "mdl"
            }
        );
        assert_eq!(file_type_info("lua/autorun/init.lua").kind, "lua");
        assert_eq!(file_type_info("sound/beep.ogg").icon, "sound");
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert_eq!(file_type_info("MODEL.MDL"), file_type_info("model.mdl"));
        assert_eq!(file_type_info("maps/gm_flat.BsP").kind, "bsp");
    }

    #[test]
    fn test_unknown_extensions_fall_back() {
        assert_eq!(file_type_info("noext"), GENERIC_FILE);
        assert_eq!(file_type_info("archive.tar.xyz"), GENERIC_FILE);
        assert_eq!(file_type_info("trailing."), GENERIC_FILE);
        assert_eq!(file_type_info(""), GENERIC_FILE);
    }

    #[test]
    fn test_last_dot_wins() {
        assert_eq!(file_type_info("materials/a.vmt.vtf").kind, "vtf");
    }

    #[test]
    fn test_trim_path() {
        assert_eq!(trim_path("/addons/wire/"), "/addons/wire");
        assert_eq!(trim_path("C:\\addons\\wire\\\\"), "C:\\addons\\wire");
        assert_eq!(trim_path("addons"), "addons");
        assert_eq!(trim_path("///"), "/");
        assert_eq!(trim_path(""), "");
    }
}
