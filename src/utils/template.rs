//! String template rendering utilities.

pub struct TemplateVars;

impl TemplateVars {
    pub const ROOT: &'static str = "root";
    pub const MANIFEST: &'static str = "manifest";
    pub const SHOWCASE_DIR: &'static str = "showcaseDir";
    pub const SITE_DIR: &'static str = "siteDir";
    pub const BUNDLE: &'static str = "bundle";
    pub const ENABLE: &'static str = "enable";
}

pub fn render(template: &str, variables: &[(&str, &str)]) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

pub fn is_present(template: &str, key: &str) -> bool {
    let placeholder = format!("{{{{{}}}}}", key);
    template.contains(&placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_every_occurrence() {
        let out = render(
            "cp -r {{siteDir}} /srv && ls {{siteDir}}",
            &[(TemplateVars::SITE_DIR, "showcase")],
        );
        assert_eq!(out, "cp -r showcase /srv && ls showcase");
    }

    #[test]
    fn render_leaves_unknown_placeholders() {
        let out = render("deploy {{bundle}} {{other}}", &[(TemplateVars::BUNDLE, "/tmp/b.zip")]);
        assert_eq!(out, "deploy /tmp/b.zip {{other}}");
    }

    #[test]
    fn is_present_detects_placeholder() {
        assert!(is_present("upload {{bundle}}", TemplateVars::BUNDLE));
        assert!(!is_present("upload bundle", TemplateVars::BUNDLE));
    }
}
