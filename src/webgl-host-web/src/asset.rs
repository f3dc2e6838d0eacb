//! Asset classification by path suffix

/// Category of a served file, deciding its content type and caching rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Wasm,
    DataBlob,
    ScriptLoader,
    Script,
    Stylesheet,
    Markup,
    Image,
    Other,
}

impl AssetClass {
    pub const ALL: [AssetClass; 8] = [
        AssetClass::Wasm,
        AssetClass::DataBlob,
        AssetClass::ScriptLoader,
        AssetClass::Script,
        AssetClass::Stylesheet,
        AssetClass::Markup,
        AssetClass::Image,
        AssetClass::Other,
    ];
}

/// Suffix rules, checked in order; first match wins.
///
/// Loader and framework scripts must stay ahead of the generic `.js` rule.
const SUFFIX_RULES: &[(&str, AssetClass)] = &[
    (".framework.js", AssetClass::ScriptLoader),
    (".loader.js", AssetClass::ScriptLoader),
    ("_framework.js", AssetClass::ScriptLoader),
    ("_loader.js", AssetClass::ScriptLoader),
    (".wasm", AssetClass::Wasm),
    (".data", AssetClass::DataBlob),
    (".js", AssetClass::Script),
    (".mjs", AssetClass::Script),
    (".css", AssetClass::Stylesheet),
    (".html", AssetClass::Markup),
    (".htm", AssetClass::Markup),
    (".png", AssetClass::Image),
    (".jpg", AssetClass::Image),
    (".jpeg", AssetClass::Image),
    (".gif", AssetClass::Image),
    (".ico", AssetClass::Image),
    (".svg", AssetClass::Image),
    (".webp", AssetClass::Image),
];

/// Classify a request path. Total: anything unrecognized is `Other`.
pub fn classify(path: &str) -> AssetClass {
    let path = path
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or(path);

    SUFFIX_RULES
        .iter()
        .find(|(suffix, _)| ends_with_ignore_case(path, suffix))
        .map(|&(_, class)| class)
        .unwrap_or(AssetClass::Other)
}

fn ends_with_ignore_case(path: &str, suffix: &str) -> bool {
    path.len() >= suffix.len()
        && path.as_bytes()[path.len() - suffix.len()..].eq_ignore_ascii_case(suffix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_build_files() {
        assert_eq!(classify("/Build/app.wasm"), AssetClass::Wasm);
        assert_eq!(classify("/Build/app.data"), AssetClass::DataBlob);
        assert_eq!(classify("/Build/app.framework.js"), AssetClass::ScriptLoader);
        assert_eq!(classify("/Build/app.loader.js"), AssetClass::ScriptLoader);
        assert_eq!(classify("Build/deployment_1_1_framework.js"), AssetClass::ScriptLoader);
        assert_eq!(classify("Build/deployment_1_1_loader.js"), AssetClass::ScriptLoader);
    }

    #[test]
    fn test_loader_does_not_fall_through_to_script() {
        assert_eq!(classify("app.framework.js"), AssetClass::ScriptLoader);
        assert_ne!(classify("app.framework.js"), AssetClass::Script);
        assert_eq!(classify("app.js"), AssetClass::Script);
        assert_eq!(classify("framework.js"), AssetClass::Script);
    }

    #[test]
    fn test_specific_rules_precede_generic_ones() {
        // Every rule must be reachable: no earlier rule may swallow it.
        for (i, (suffix, class)) in SUFFIX_RULES.iter().enumerate() {
            let probe = format!("file{}", suffix);
            assert_eq!(classify(&probe), *class, "rule {} ({}) is shadowed", i, suffix);
        }
    }

    #[test]
    fn test_template_data_and_markup() {
        assert_eq!(classify("/TemplateData/style.css"), AssetClass::Stylesheet);
        assert_eq!(classify("/TemplateData/favicon.ico"), AssetClass::Image);
        assert_eq!(classify("/TemplateData/unity-logo-dark.png"), AssetClass::Image);
        assert_eq!(classify("/index.html"), AssetClass::Markup);
    }

    #[test]
    fn test_case_and_query_are_ignored() {
        assert_eq!(classify("/Build/APP.WASM"), AssetClass::Wasm);
        assert_eq!(classify("/Build/app.wasm?v=3"), AssetClass::Wasm);
        assert_eq!(classify("/index.html#top"), AssetClass::Markup);
    }

    #[test]
    fn test_unmatched_is_other() {
        assert_eq!(classify(""), AssetClass::Other);
        assert_eq!(classify("/"), AssetClass::Other);
        assert_eq!(classify("/no-such-file.xyz"), AssetClass::Other);
        assert_eq!(classify("/Build/app.wasm.bak"), AssetClass::Other);
        assert_eq!(classify("wasm"), AssetClass::Other);
    }
}
