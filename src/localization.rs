//! User-facing strings, loaded from Fluent resources under `locales/`.

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use log::warn;
use unic_langid::LanguageIdentifier;

const DEFAULT_LANGUAGE: &str = "en";

/// Bundled locales: language code and resource source
const LOCALES: &[(&str, &str)] = &[("en", include_str!("../locales/en/main.ftl"))];

/// Localization manager for the pitch bot
pub struct LocalizationManager {
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        for (code, source) in LOCALES {
            let locale: LanguageIdentifier = code.parse()?;
            bundles.insert(code.to_string(), Self::create_bundle(locale, source)?);
        }
        Ok(Self { bundles })
    }

    fn create_bundle(locale: LanguageIdentifier, source: &str) -> Result<FluentBundle<FluentResource>> {
        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid Fluent resource for {locale}: {errors:?}"))?;
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate Fluent messages: {errors:?}"))?;
        Ok(bundle)
    }

    /// Whether a bundle exists for the language
    pub fn is_language_supported(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    fn bundle_for(&self, language: Option<&str>) -> Option<&FluentBundle<FluentResource>> {
        // Telegram sends tags like "en-US"; only the primary subtag is used
        let primary = language.and_then(|l| l.split(['-', '_']).next()).unwrap_or(DEFAULT_LANGUAGE);
        self.bundles
            .get(primary)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
    }

    /// Message in the given language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let Some(bundle) = self.bundle_for(Some(language)) else {
            return format!("Missing translation: {key}");
        };
        let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) else {
            return format!("Missing translation: {key}");
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            warn!("Formatting errors for message {key}: {errors:?}");
        }
        value.into_owned()
    }

    pub fn get_message(&self, key: &str, args: Option<&HashMap<&str, &str>>) -> String {
        self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
    }
}

static LOCALIZATION_MANAGER: LazyLock<Option<LocalizationManager>> =
    LazyLock::new(|| match LocalizationManager::new() {
        Ok(manager) => Some(manager),
        Err(e) => {
            warn!("Localization unavailable: {e}");
            None
        }
    });

/// Load the bundled resources, reporting broken ones at startup
pub fn init_localization() -> Result<()> {
    LOCALIZATION_MANAGER
        .as_ref()
        .map(|_| ())
        .ok_or_else(|| anyhow!("Failed to load localization resources"))
}

/// Localized message for the user's language
pub fn t_lang(key: &str, language: Option<&str>) -> String {
    t_args_lang(key, &[], language)
}

/// Localized message with arguments for the user's language
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language: Option<&str>) -> String {
    match LOCALIZATION_MANAGER.as_ref() {
        Some(manager) => {
            let args: HashMap<&str, &str> = args.iter().cloned().collect();
            manager.get_message_in_language(key, language.unwrap_or(DEFAULT_LANGUAGE), Some(&args))
        }
        None => key.to_string(),
    }
}
