//! Signed-in identity and the client route table.

use serde::{Deserialize, Serialize};

/// A user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id.
    pub uid: String,
    /// Sign-in email, when the provider shares one.
    pub email: Option<String>,
    /// Display name, when set.
    pub display_name: Option<String>,
}

impl Identity {
    /// Identity with only a uid and email.
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: Some(email.into()),
            display_name: None,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name stamped into authorship fields: display name, else email, else
    /// the uid.
    pub fn author_label(&self) -> String {
        [self.display_name.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(&self.uid)
            .to_string()
    }
}

/// Client-side routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/login`
    Login,
    /// `/`, the posts board
    Home,
    /// `/mistakes`
    Mistakes,
    /// `/likes-dislikes`
    LikesDislikes,
    /// `/media`
    Media,
    /// `/countdown`
    Countdown,
    /// `/Favourite`
    Favourite,
    /// `/Songs`
    Songs,
    /// `/Profile`
    Profile,
    /// `/Journal`
    Journal,
    /// `/ShoppingList`
    ShoppingList,
    /// `/ReelsComponent`
    Reels,
    /// `/Story`
    Story,
    /// `/MoodJournal`
    MoodJournal,
}

impl Route {
    /// Every route, login first.
    pub const ALL: [Route; 14] = [
        Route::Login,
        Route::Home,
        Route::Mistakes,
        Route::LikesDislikes,
        Route::Media,
        Route::Countdown,
        Route::Favourite,
        Route::Songs,
        Route::Profile,
        Route::Journal,
        Route::ShoppingList,
        Route::Reels,
        Route::Story,
        Route::MoodJournal,
    ];

    /// URL path.
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Home => "/",
            Route::Mistakes => "/mistakes",
            Route::LikesDislikes => "/likes-dislikes",
            Route::Media => "/media",
            Route::Countdown => "/countdown",
            Route::Favourite => "/Favourite",
            Route::Songs => "/Songs",
            Route::Profile => "/Profile",
            Route::Journal => "/Journal",
            Route::ShoppingList => "/ShoppingList",
            Route::Reels => "/ReelsComponent",
            Route::Story => "/Story",
            Route::MoodJournal => "/MoodJournal",
        }
    }

    /// Exact-match lookup; a single trailing slash is ignored.
    pub fn from_path(path: &str) -> Option<Route> {
        let trimmed = match path.strip_suffix('/') {
            Some(rest) if !rest.is_empty() => rest,
            _ => path,
        };
        Route::ALL.into_iter().find(|r| r.path() == trimmed)
    }

    /// Only the login screen is reachable without an identity.
    pub fn is_public(self) -> bool {
        matches!(self, Route::Login)
    }
}

/// What the router should do with a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Render the route.
    Allow(Route),
    /// Send the user to `/login`.
    RedirectToLogin,
    /// No such route.
    NotFound,
}

/// Gates every route except `/login` behind a signed-in identity.
pub fn guard(path: &str, identity: Option<&Identity>) -> RouteDecision {
    match Route::from_path(path) {
        None => RouteDecision::NotFound,
        Some(route) if route.is_public() || identity.is_some() => RouteDecision::Allow(route),
        Some(_) => RouteDecision::RedirectToLogin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_label_prefers_display_name() {
        let anna = Identity::new("u1", "anna@example.com");
        assert_eq!(anna.author_label(), "anna@example.com");
        assert_eq!(anna.clone().with_display_name("Anna").author_label(), "Anna");
        assert_eq!(anna.with_display_name("  ").author_label(), "anna@example.com");
    }

    #[test]
    fn routes_redirect_until_signed_in() {
        let me = Identity::new("u1", "me@example.com");
        assert_eq!(guard("/login", None), RouteDecision::Allow(Route::Login));
        assert_eq!(guard("/Songs", None), RouteDecision::RedirectToLogin);
        assert_eq!(guard("/Songs/", Some(&me)), RouteDecision::Allow(Route::Songs));
        assert_eq!(guard("/", Some(&me)), RouteDecision::Allow(Route::Home));
        assert_eq!(guard("/songs", Some(&me)), RouteDecision::NotFound);
    }
}
