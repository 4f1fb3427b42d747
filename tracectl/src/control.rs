// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tracing runtime control.

use crate::targets::TRACING_TARGETS;
use crate::trace_target;
use ordermap::OrderMap;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::{info, warn};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, prelude::*, reload};

trace_target!("tracectl", LevelFilter::INFO, &[]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceCtlError {
    #[error("invalid tracing directive '{0}': expected tag=level")]
    Syntax(String),
    #[error("invalid level '{level}' for '{tag}'")]
    Level { tag: String, level: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCfg {
    pub target: &'static str,
    pub name: &'static str,
    pub level: LevelFilter,
    pub tags: Vec<&'static str>,
}

impl TargetCfg {
    fn new(
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &[&'static str],
    ) -> Self {
        // a target can always be addressed by its name
        let mut tags = tags.to_vec();
        if !tags.contains(&name) {
            tags.push(name);
        }
        Self {
            target,
            name,
            level,
            tags,
        }
    }
}

#[derive(Debug)]
pub(crate) struct TargetDb {
    pub(crate) level: LevelFilter,
    pub(crate) targets: OrderMap<&'static str, TargetCfg>,
    pub(crate) tags: OrderMap<&'static str, Vec<&'static str>>,
}

impl TargetDb {
    pub(crate) fn new(level: LevelFilter) -> Self {
        Self {
            level,
            targets: OrderMap::new(),
            tags: OrderMap::new(),
        }
    }

    fn with_declared_targets(level: LevelFilter) -> Self {
        let mut db = Self::new(level);
        for decl in TRACING_TARGETS {
            db.register(decl.target, decl.name, decl.level, decl.tags);
        }
        db
    }

    pub(crate) fn register(
        &mut self,
        target: &'static str,
        name: &'static str,
        level: LevelFilter,
        tags: &[&'static str],
    ) {
        let cfg = TargetCfg::new(target, name, level, tags);
        for tag in &cfg.tags {
            let members = self.tags.entry(tag).or_default();
            if !members.contains(&target) {
                members.push(target);
            }
        }
        if self.targets.insert(target, cfg).is_some() {
            warn!("Tracing target {target} declared more than once");
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::new(self.level.to_string());
        for cfg in self.targets.values() {
            match format!("{}={}", cfg.target, cfg.level).parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => warn!("Skipping tracing target {}: {e}", cfg.target),
            }
        }
        filter
    }

    /// Set the level of every target carrying `tag`, returning how many targets changed.
    pub(crate) fn set_tag_level(&mut self, tag: &str, level: LevelFilter) -> usize {
        let Some(members) = self.tags.get(tag) else {
            return 0;
        };
        let mut changed = 0;
        for target in members {
            if let Some(cfg) = self.targets.get_mut(target)
                && cfg.level != level
            {
                cfg.level = level;
                changed += 1;
            }
        }
        changed
    }

    pub(crate) fn targets_by_tag(&self, tag: &str) -> Vec<TargetCfg> {
        self.tags
            .get(tag)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|t| self.targets.get(t).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parse a comma-separated list of `tag=level` directives.
pub(crate) fn parse_directives(input: &str) -> Result<OrderMap<String, LevelFilter>, TraceCtlError> {
    let mut directives = OrderMap::new();
    for item in input.split(',').map(str::trim) {
        let (tag, level) = item
            .split_once('=')
            .ok_or_else(|| TraceCtlError::Syntax(item.to_string()))?;
        let (tag, level) = (tag.trim(), level.trim());
        let parsed = LevelFilter::from_str(level).map_err(|_| TraceCtlError::Level {
            tag: tag.to_string(),
            level: level.to_string(),
        })?;
        directives.insert(tag.to_string(), parsed);
    }
    Ok(directives)
}

#[derive(Debug)]
pub struct TracingControl {
    db: Mutex<TargetDb>,
    reload_filter: reload::Handle<EnvFilter, Registry>,
}

static TRACING_CTL: OnceLock<TracingControl> = OnceLock::new();

/// Get the process-wide [`TracingControl`], installing the subscriber on first use.
pub fn get_trace_ctl() -> &'static TracingControl {
    TRACING_CTL.get_or_init(TracingControl::new)
}

impl TracingControl {
    fn new() -> Self {
        let db = TargetDb::with_declared_targets(LevelFilter::INFO);
        let (filter, reload_filter) = reload::Layer::new(db.env_filter());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_line_number(true)
            .with_target(true)
            .with_thread_names(true)
            .with_level(true);

        // a test harness may already own the global subscriber
        if let Err(e) = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(ErrorLayer::default())
            .try_init()
        {
            warn!("Tracing subscriber already installed: {e}");
        }

        Self {
            db: Mutex::new(db),
            reload_filter,
        }
    }

    fn db(&self) -> MutexGuard<'_, TargetDb> {
        // the database holds plain values, a panic elsewhere cannot leave it inconsistent
        self.db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn reload(&self, db: &TargetDb) {
        if let Err(e) = self.reload_filter.reload(db.env_filter()) {
            warn!("Failed to reload tracing filter: {e}");
        }
    }

    pub fn init() {
        get_trace_ctl();
    }

    pub fn set_default_level(&self, level: LevelFilter) {
        let mut db = self.db();
        if db.level != level {
            db.level = level;
            self.reload(&db);
            info!("Default log level set to {level}");
        }
    }

    #[must_use]
    pub fn default_level(&self) -> LevelFilter {
        self.db().level
    }

    pub fn set_tag_level(&self, tag: &str, level: LevelFilter) {
        let mut db = self.db();
        let changed = db.set_tag_level(tag, level);
        if changed > 0 {
            self.reload(&db);
        }
        info!("Log level for tag '{tag}' set to {level} ({changed} targets changed)");
    }

    pub fn set_level_all(&self, level: LevelFilter) {
        let mut db = self.db();
        for cfg in db.targets.values_mut() {
            cfg.level = level;
        }
        self.reload(&db);
    }

    /// Apply a configuration such as `default=warn,all=info,ipa-nat=debug`.
    ///
    /// `default` sets the level of undeclared targets, `all` sets every declared target, and any
    /// other key is a tag. Tags are applied after `all`, so they can override it.
    ///
    /// # Errors
    ///
    /// Returns a [`TraceCtlError`] if a directive is malformed or names an unknown level. Nothing
    /// is applied in that case.
    pub fn setup_from_string(&self, input: &str) -> Result<(), TraceCtlError> {
        let directives = parse_directives(input)?;
        if let Some(level) = directives.get("default") {
            self.set_default_level(*level);
        }
        if let Some(level) = directives.get("all") {
            self.set_level_all(*level);
        }
        for (tag, level) in directives
            .iter()
            .filter(|(tag, _)| !matches!(tag.as_str(), "default" | "all"))
        {
            self.set_tag_level(tag, *level);
        }
        Ok(())
    }

    #[must_use]
    pub fn target(&self, target: &str) -> Option<TargetCfg> {
        self.db().targets.get(target).cloned()
    }

    #[must_use]
    pub fn targets_by_tag(&self, tag: &str) -> Vec<TargetCfg> {
        self.db().targets_by_tag(tag)
    }

    pub fn dump(&self) {
        let db = self.db();
        info!("{db}");
    }

    pub fn dump_targets_by_tag(&self) {
        let db = self.db();
        info!("{}", crate::display::ByTag(&db));
    }
}

#[cfg(test)]
mod tests {
    use super::{TargetDb, TraceCtlError, get_trace_ctl, parse_directives};
    use crate::LevelFilter;
    use crate::targets::TRACING_TARGETS;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    fn parse_valid_directives() {
        let parsed = parse_directives("default=warn, ipa-nat=debug ,all=off").unwrap();
        let parsed: Vec<_> = parsed.into_iter().collect();
        assert_eq!(
            parsed,
            vec![
                ("default".to_string(), LevelFilter::WARN),
                ("ipa-nat".to_string(), LevelFilter::DEBUG),
                ("all".to_string(), LevelFilter::OFF),
            ]
        );
    }

    #[test]
    fn parse_rejects_missing_level() {
        assert_eq!(
            parse_directives("ipa-nat=debug, foo"),
            Err(TraceCtlError::Syntax("foo".to_string()))
        );
    }

    #[test]
    fn parse_rejects_bad_level() {
        assert!(matches!(
            parse_directives("ipa-nat=loud"),
            Err(TraceCtlError::Level { .. })
        ));
    }

    #[test]
    fn tags_group_targets() {
        let mut db = TargetDb::new(LevelFilter::INFO);
        db.register("crate::a", "a", LevelFilter::DEBUG, &["table"]);
        db.register("crate::b", "b", LevelFilter::WARN, &["table"]);
        db.register("crate::c", "c", LevelFilter::WARN, &[]);

        assert_eq!(db.targets_by_tag("table").len(), 2);
        assert_eq!(db.targets_by_tag("c").len(), 1);
        assert_eq!(db.set_tag_level("table", LevelFilter::WARN), 1);
        assert!(
            db.targets_by_tag("table")
                .iter()
                .all(|t| t.level == LevelFilter::WARN)
        );
        assert_eq!(db.set_tag_level("missing", LevelFilter::OFF), 0);
    }

    #[test]
    fn declared_targets_are_collected() {
        let names: Vec<&str> = TRACING_TARGETS.iter().map(|t| t.name).collect();
        assert!(names.contains(&"tracectl"));
    }

    #[test]
    #[serial]
    fn setup_from_string_applies_tags() {
        const TARGET: &str = "ipanat_tracectl::control";
        let tctl = get_trace_ctl();
        tctl.setup_from_string("tracectl=debug").unwrap();
        assert_eq!(
            tctl.target(TARGET).map(|t| t.level),
            Some(LevelFilter::DEBUG)
        );
        tctl.setup_from_string("default=warn,all=error,tracectl=info")
            .unwrap();
        assert_eq!(tctl.default_level(), LevelFilter::WARN);
        assert_eq!(
            tctl.target(TARGET).map(|t| t.level),
            Some(LevelFilter::INFO)
        );
        assert!(tctl.setup_from_string("tracectl").is_err());
    }
}
