//! Tracked interaction wrappers
//!
//! Convert one discrete user action (CTA activation, link activation) into
//! exactly one analytics event, then let the action proceed untouched.
//! Reporting is best effort: a failing reporter never blocks the action.

use tracing::debug;

use crate::reporter::{report_best_effort, Reporter};
use crate::types::{CtaCategory, InteractionEvent, LinkCategory, Metadata};

/// A call-to-action with tracking attached
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedCta {
    pub name: String,
    pub location: String,
    pub category: CtaCategory,
    pub metadata: Option<Metadata>,
}

impl TrackedCta {
    pub fn new(name: impl Into<String>, location: impl Into<String>, category: CtaCategory) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            category,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The record reported for one activation
    pub fn interaction(&self) -> InteractionEvent {
        InteractionEvent::cta(&self.name, &self.location, self.category, self.metadata.clone())
    }

    /// Report the activation. Returns whether the reporter accepted it.
    pub fn track(&self, reporter: &dyn Reporter) -> bool {
        let interaction = self.interaction();
        debug!(name = %self.name, category = %self.category, "cta activated");
        report_best_effort(reporter, "cta_activation", |r| interaction.report(r))
    }

    /// Report the activation, then run the original handler exactly once.
    pub fn activate<F, R>(&self, reporter: &dyn Reporter, on_activate: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.track(reporter);
        on_activate()
    }
}

/// Where a link destination leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    /// `scheme://...` or protocol-relative `//host/...`
    Absolute,
    MailTo,
    Tel,
    /// Anything the in-app router handles
    Internal,
}

impl DestinationKind {
    pub fn classify(destination: &str) -> Self {
        let trimmed = destination.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("mailto:") {
            DestinationKind::MailTo
        } else if lower.starts_with("tel:") {
            DestinationKind::Tel
        } else if trimmed.starts_with("//") || has_url_scheme(trimmed) {
            DestinationKind::Absolute
        } else {
            DestinationKind::Internal
        }
    }

    pub fn is_external(self) -> bool {
        !matches!(self, DestinationKind::Internal)
    }
}

fn has_url_scheme(destination: &str) -> bool {
    let Some((scheme, _)) = destination.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// How an activated link is followed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRoute {
    /// Plain hyperlink, optionally in a new browsing context
    Hyperlink { href: String, new_context: bool },
    /// In-app navigation primitive
    InApp { path: String },
}

/// Host navigation primitives
pub trait Navigator {
    /// Follow a plain hyperlink
    fn open(&mut self, href: &str, new_context: bool);

    /// Navigate inside the app
    fn push(&mut self, path: &str);
}

/// Remembers every navigation in order
#[derive(Debug, Default, Clone)]
pub struct RecordingNavigator {
    pub visits: Vec<LinkRoute>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Navigator for RecordingNavigator {
    fn open(&mut self, href: &str, new_context: bool) {
        self.visits.push(LinkRoute::Hyperlink {
            href: href.to_string(),
            new_context,
        });
    }

    fn push(&mut self, path: &str) {
        self.visits.push(LinkRoute::InApp { path: path.to_string() });
    }
}

/// A link with tracking attached
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedLink {
    pub destination: String,
    pub text: String,
    pub category: LinkCategory,
    /// Explicitly marked as leaving the site; opens in a new context
    pub external: bool,
}

impl TrackedLink {
    pub fn new(destination: impl Into<String>, text: impl Into<String>, category: LinkCategory) -> Self {
        Self {
            destination: destination.into(),
            text: text.into(),
            category,
            external: false,
        }
    }

    pub fn external(mut self, external: bool) -> Self {
        self.external = external;
        self
    }

    pub fn interaction(&self) -> InteractionEvent {
        InteractionEvent::link(&self.destination, &self.text, self.category)
    }

    /// Routing decision for this destination
    pub fn route(&self) -> LinkRoute {
        match DestinationKind::classify(&self.destination) {
            DestinationKind::Absolute => LinkRoute::Hyperlink {
                href: self.destination.clone(),
                new_context: self.external,
            },
            DestinationKind::MailTo | DestinationKind::Tel => LinkRoute::Hyperlink {
                href: self.destination.clone(),
                new_context: false,
            },
            DestinationKind::Internal => LinkRoute::InApp {
                path: self.destination.clone(),
            },
        }
    }

    /// Report the activation. Returns whether the reporter accepted it.
    pub fn track(&self, reporter: &dyn Reporter) -> bool {
        let interaction = self.interaction();
        debug!(destination = %self.destination, category = %self.category, "link activated");
        report_best_effort(reporter, "link_activation", |r| interaction.report(r))
    }

    /// Report the activation, then follow the link.
    pub fn activate(&self, reporter: &dyn Reporter, navigator: &mut dyn Navigator) -> LinkRoute {
        self.track(reporter);

        let route = self.route();
        match &route {
            LinkRoute::Hyperlink { href, new_context } => navigator.open(href, *new_context),
            LinkRoute::InApp { path } => navigator.push(path),
        }
        route
    }
}
