mod common;

use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use common::{Call, ScriptedBackend, client_over, settle};
use duolog::{
    auth::{Identity, Route, RouteDecision},
    document::Fields,
    features::{
        countdown::{Countdowns, NewCountdown, PASSED},
        favorites::Favorites,
        journal::{EventKind, Journal},
        posts::Posts,
        profile::Profiles,
        reels::Reels,
        shopping::ShoppingList,
        songs::Songs,
        stories::{Stories, StoryEdit},
    },
    sync::{RemoteBackend, SyncError},
    types::collections,
};

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[tokio::test]
async fn boards_only_show_their_category_newest_first() {
    let backend = ScriptedBackend::new();
    let seed = backend.handle();
    for (message, category, timestamp) in [
        ("first", "home", 10),
        ("oops", "mistakes", 20),
        ("latest", "home", 30),
    ] {
        seed.create(
            collections::POSTS,
            fields(json!({ "message": message, "category": category, "timestamp": timestamp })),
        )
        .await
        .expect("seed");
    }
    let (client, _) = client_over(&backend);

    let home = client.open(Posts::for_route(Route::Home).expect("board")).await.expect("open");
    let messages: Vec<_> = home.records().into_iter().map(|p| p.message).collect();
    assert_eq!(messages, ["latest", "first"]);
    assert!(home.records().iter().all(|p| p.replies.is_empty()));

    let mistakes = client.open(Posts::category("mistakes")).await.expect("open");
    assert_eq!(mistakes.records().len(), 1);
    assert_eq!(mistakes.records()[0].message, "oops");
    assert!(Posts::for_route(Route::Songs).is_none());
}

#[tokio::test]
async fn story_edits_are_validated_then_applied() {
    let backend = ScriptedBackend::new();
    let (client, _) = client_over(&backend);
    client.sign_in(Identity::new("u1", "writer@example.com"));
    let mut stories = client.open(Stories).await.expect("open");

    let id = stories.add_story("Rain", "It rained all day.", None).await.expect("add");
    settle(&mut stories, |v| v.mirror().pending() == 0 && v.mirror().len() == 1).await;
    assert_eq!(stories.records()[0].user, "writer@example.com");

    let blank = StoryEdit {
        title: " ".into(),
        text: "still here".into(),
        thumbnail: None,
    };
    let err = stories.edit_story(&id, blank).await.expect_err("blank title");
    assert!(matches!(err, SyncError::Validation(ref v) if v.message == "Please enter a title and story text"));
    assert_eq!(backend.calls().len(), 1);

    let edit = StoryEdit {
        title: "Sun".into(),
        text: "Then the sun came out.".into(),
        thumbnail: Some("https://img.example.com/sun.png".into()),
    };
    stories.edit_story(&id, edit).await.expect("edit");
    assert_eq!(stories.records()[0].title, "Sun", "optimistic");
    settle(&mut stories, |v| {
        v.mirror().pending() == 0 && v.mirror().authoritative()[0].str_field("title") == "Sun"
    })
    .await;
    let story = stories.record(&id).expect("present");
    assert_eq!(story.text, "Then the sun came out.");
    assert_eq!(story.thumbnail.as_deref(), Some("https://img.example.com/sun.png"));
}

#[tokio::test]
async fn journal_groups_events_by_tab() {
    let backend = ScriptedBackend::new();
    backend
        .handle()
        .create(
            collections::EVENTS,
            fields(json!({ "type": "birthday", "description": "??", "timestamp": 1 })),
        )
        .await
        .expect("seed");
    let (client, _) = client_over(&backend);
    let mut journal = client.open(Journal).await.expect("open");

    let err = journal.add_event(EventKind::Daily, "Coffee").await.expect_err("signed out");
    assert!(matches!(err, SyncError::Validation(_)));

    client.sign_in(Identity::new("u1", "me@example.com").with_display_name("Sam"));
    for (kind, description) in [
        (EventKind::Daily, "Coffee"),
        (EventKind::Sad, "Missed the train"),
        (EventKind::Daily, "Walk"),
    ] {
        journal.add_event(kind, description).await.expect("add");
        // Distinct timestamps keep the ascending order deterministic.
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    settle(&mut journal, |v| v.mirror().pending() == 0 && v.mirror().len() == 4).await;

    let grouped = journal.grouped();
    let daily: Vec<_> = grouped.of(EventKind::Daily).iter().map(|e| e.description.as_str()).collect();
    assert_eq!(daily, ["Coffee", "Walk"]);
    assert_eq!(grouped.sad.len(), 1);
    assert!(grouped.special.is_empty());
    assert_eq!(grouped.sad[0].username, "Sam");
    assert_eq!(grouped.sad[0].user, "u1");
}

#[tokio::test]
async fn avatar_upload_merges_into_the_profile_document() {
    let backend = ScriptedBackend::new();
    let (client, blobs) = client_over(&backend);
    let mut profiles = client.open(Profiles).await.expect("open");

    assert!(profiles.upload_avatar(vec![1, 2]).await.is_err(), "signed out");
    assert!(backend.calls().is_empty());

    client.sign_in(Identity::new("u1", "me@example.com").with_display_name("Sam"));
    let url = profiles.upload_avatar(vec![1, 2]).await.expect("upload");
    assert_eq!(blobs.read("avatars/u1").await, Some(vec![1, 2]));

    let calls = backend.calls();
    let [Call::Merge { collection, id, patch }] = calls.as_slice() else {
        panic!("expected one merge, got {calls:?}");
    };
    assert_eq!(collection, collections::USERS);
    assert_eq!(id, "u1");
    assert_eq!(patch.set["photoURL"], url.as_str());
    assert_eq!(patch.set["displayName"], "Sam");

    settle(&mut profiles, |v| v.mirror().pending() == 0 && v.mirror().contains("u1")).await;
    profiles.set_bio("Hiker").await.expect("bio");
    settle(&mut profiles, |v| {
        v.mirror().pending() == 0 && v.mirror().authoritative()[0].str_field("bio") == "Hiker"
    })
    .await;

    let mine = profiles.my_profile().expect("profile");
    assert_eq!(mine.id, "u1");
    assert_eq!(mine.photo_url, url);
    assert_eq!(mine.display_name, "Sam");
    assert_eq!(mine.bio, "Hiker");
    let Some(Call::Merge { patch, .. }) = backend.calls().last().cloned() else {
        panic!("expected a merge");
    };
    assert!(!patch.set.contains_key("displayName"));
}

#[tokio::test]
async fn countdowns_reject_bad_dates_and_label_the_rest() {
    let backend = ScriptedBackend::new();
    let (client, _) = client_over(&backend);
    let mut countdowns = client.open(Countdowns).await.expect("open");

    let bad = NewCountdown {
        occasion_name: "Trip".into(),
        date: "2030-02-31".into(),
        time: String::new(),
    };
    let err = countdowns.add_countdown(&bad).await.expect_err("no such day");
    assert!(matches!(err, SyncError::Validation(ref v) if v.message == "Invalid date or time provided."));
    assert!(backend.calls().is_empty());

    let trip = NewCountdown {
        occasion_name: "Trip".into(),
        date: "2030-01-02".into(),
        time: "03:04".into(),
    };
    countdowns.add_countdown(&trip).await.expect("add");
    let Some(Call::Create { fields, .. }) = backend.calls().first().cloned() else {
        panic!("expected a create");
    };
    assert_eq!(fields["targetDate"], "2030-01-02T03:04:00.000Z");
    assert_eq!(fields["occasionName"], "Trip");

    let before = Utc.with_ymd_and_hms(2029, 12, 30, 3, 4, 0).single().expect("valid");
    let after = Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).single().expect("valid");
    let labels: Vec<_> = countdowns.labels_at(before).into_iter().map(|(_, l)| l).collect();
    assert_eq!(labels, ["3 days left"]);
    let labels: Vec<_> = countdowns.labels_at(after).into_iter().map(|(_, l)| l).collect();
    assert_eq!(labels, [PASSED]);
}

#[tokio::test]
async fn reels_need_a_recognizable_url() {
    let backend = ScriptedBackend::new();
    let (client, _) = client_over(&backend);
    let mut reels = client.open(Reels).await.expect("open");

    assert!(reels.add_reel("https://example.com/video", "nope").await.is_err());
    assert!(backend.calls().is_empty());

    reels
        .add_reel("https://www.instagram.com/reel/Cx9_z/", "Dance")
        .await
        .expect("add");
    settle(&mut reels, |v| v.mirror().pending() == 0 && v.mirror().len() == 1).await;
    assert_eq!(reels.records()[0].reel_id, "Cx9_z");
}

#[tokio::test]
async fn legacy_items_sort_last_until_backfilled() {
    let backend = ScriptedBackend::new();
    let (legacy, _) = backend
        .handle()
        .create(collections::SHOPPING_LIST, fields(json!({ "name": "Old soap" })))
        .await
        .expect("seed");
    let (client, _) = client_over(&backend);
    let mut list = client.open(ShoppingList).await.expect("open");
    list.add_item("Milk", "").await.expect("add");
    settle(&mut list, |v| v.mirror().pending() == 0 && v.mirror().len() == 2).await;

    let rows = list.records();
    assert_eq!(rows[0].name, "Milk");
    assert_eq!(rows[1].id, legacy);
    assert_eq!(rows[1].created_at, 0);

    assert_eq!(list.backfill_created_at().await.expect("backfill"), 1);
    let Some(Call::Update { id, patch, .. }) = backend.calls().last().cloned() else {
        panic!("expected an update");
    };
    assert_eq!(id, legacy);
    assert!(patch.set.contains_key("createdAt"));
    settle(&mut list, |v| v.mirror().pending() == 0 && v.records().iter().all(|i| i.created_at > 0)).await;
    assert_eq!(list.backfill_created_at().await.expect("nothing left"), 0);
}

#[tokio::test]
async fn routes_require_sign_in_except_login() {
    let backend = ScriptedBackend::new();
    let (client, _) = client_over(&backend);

    assert_eq!(client.route("/login"), RouteDecision::Allow(Route::Login));
    assert_eq!(client.route("/Songs"), RouteDecision::RedirectToLogin);
    assert_eq!(client.route("/nowhere"), RouteDecision::NotFound);

    client.sign_in(Identity::new("u1", "me@example.com"));
    assert_eq!(client.route("/Songs/"), RouteDecision::Allow(Route::Songs));
    assert_eq!(client.route("/ReelsComponent"), RouteDecision::Allow(Route::Reels));

    client.sign_out();
    assert_eq!(client.route("/"), RouteDecision::RedirectToLogin);
}

#[tokio::test]
async fn favorites_and_songs_are_stamped_with_the_author() {
    let backend = ScriptedBackend::new();
    let (client, _) = client_over(&backend);
    let mut favorites = client.open(Favorites).await.expect("open favorites");
    let mut songs = client.open(Songs).await.expect("open songs");

    assert!(favorites.add_favorite("Tea", "").await.is_err(), "signed out");
    client.sign_in(Identity::new("u1", "me@example.com"));
    assert!(songs.add_song("Intro", "  ", "").await.is_err(), "blank link");
    assert!(backend.calls().is_empty());

    favorites.add_favorite("Tea", "https://img.example.com/tea.png").await.expect("favorite");
    songs.add_song("Intro", "https://music.example.com/intro", "").await.expect("song");
    settle(&mut favorites, |v| v.mirror().pending() == 0 && v.mirror().len() == 1).await;
    settle(&mut songs, |v| v.mirror().pending() == 0 && v.mirror().len() == 1).await;

    let records = favorites.records();
    let tea = &records[0];
    assert_eq!(tea.name, "Tea");
    assert_eq!(tea.author, "me@example.com");
    assert_eq!(tea.image_url, "https://img.example.com/tea.png");
    assert_eq!(songs.records()[0].author, "me@example.com");
}
