//! # bb-ui
//!
//! Askama views over repository output. Values are HTML-escaped by the
//! templates; nothing here touches the store.

use askama::Template;
use bb_core::models::{Ad, AdId};

/// Board home: every ad, newest first.
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub page_title: &'a str,
    pub ads: &'a [(AdId, Ad)],
    /// Records skipped because they could not be read.
    pub corrupt_count: usize,
}

/// One ad with its comments and the comment form.
#[derive(Template)]
#[template(path = "ad.html")]
pub struct AdTemplate<'a> {
    pub page_title: &'a str,
    pub id: AdId,
    pub ad: &'a Ad,
    pub error: Option<&'a str>,
    pub comment_author: &'a str,
    pub comment_text: &'a str,
}

impl<'a> AdTemplate<'a> {
    pub fn new(id: AdId, ad: &'a Ad) -> Self {
        Self {
            page_title: &ad.title,
            id,
            ad,
            error: None,
            comment_author: "",
            comment_text: "",
        }
    }
}

#[derive(Template)]
#[template(path = "new_ad.html")]
pub struct NewAdTemplate<'a> {
    pub page_title: &'a str,
    pub error: Option<&'a str>,
    pub ad_author: &'a str,
    pub title: &'a str,
    pub ad_text: &'a str,
}

impl Default for NewAdTemplate<'_> {
    fn default() -> Self {
        Self {
            page_title: "Post an ad",
            error: None,
            ad_author: "",
            title: "",
            ad_text: "",
        }
    }
}

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate<'a> {
    pub page_title: &'a str,
}

impl Default for NotFoundTemplate<'_> {
    fn default() -> Self {
        Self { page_title: "Not found" }
    }
}
