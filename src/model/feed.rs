// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::FeedId;

/// A subscription: where it comes from, how many episodes to keep, and
/// whether `update`/`download` should touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    id: FeedId,
    name: String,
    url: String,
    description: String,
    number_to_keep: u32,
    is_subscribed: bool,
    last_updated: Option<DateTime<Utc>>,
}

impl Feed {
    /// Store-assigned identifier.
    pub fn id(&self) -> FeedId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Retention bound applied on the next reconciliation.
    pub fn number_to_keep(&self) -> u32 {
        self.number_to_keep
    }

    pub fn is_subscribed(&self) -> bool {
        self.is_subscribed
    }

    /// When the feed was last reconciled successfully, `None` if never.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Lowercased name used for case-insensitive lookups.
    pub fn name_key(&self) -> String {
        super::name_key(&self.name)
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), ValidationError> {
        self.name = validate_name(name.into())?;
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_number_to_keep(&mut self, count: u32) -> Result<(), ValidationError> {
        self.number_to_keep = validate_retention(count)?;
        Ok(())
    }

    pub fn set_subscribed(&mut self, subscribed: bool) {
        self.is_subscribed = subscribed;
    }

    pub fn set_last_updated(&mut self, at: DateTime<Utc>) {
        self.last_updated = Some(at);
    }
}

/// A feed that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeed {
    name: String,
    url: String,
    description: String,
    number_to_keep: u32,
}

impl NewFeed {
    /// Build a new, subscribed feed record.
    ///
    /// Rejects an empty name or url and a retention count of zero.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
        number_to_keep: u32,
    ) -> Result<Self, ValidationError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ValidationError::EmptyUrl);
        }

        Ok(Self {
            name: validate_name(name.into())?,
            url,
            description: description.into(),
            number_to_keep: validate_retention(number_to_keep)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_feed(self, id: FeedId) -> Feed {
        Feed {
            id,
            name: self.name,
            url: self.url,
            description: self.description,
            number_to_keep: self.number_to_keep,
            is_subscribed: true,
            last_updated: None,
        }
    }
}

fn validate_name(name: String) -> Result<String, ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::EmptyName)
    } else {
        Ok(name)
    }
}

fn validate_retention(count: u32) -> Result<u32, ValidationError> {
    if count == 0 {
        Err(ValidationError::ZeroRetention)
    } else {
        Ok(count)
    }
}
