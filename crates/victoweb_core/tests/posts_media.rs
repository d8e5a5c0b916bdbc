use chrono::NaiveDate;
use victoweb_core::db::open_db_in_memory;
use victoweb_core::model::post::{MediaType, PostDraft, VideoDraft};
use victoweb_core::repo::post_repo::SqlitePostRepository;
use victoweb_core::repo::video_repo::SqliteVideoRepository;
use victoweb_core::service::post_service::{MediaFilter, PostService, PostServiceError};
use victoweb_core::service::video_service::{VideoService, VideoServiceError};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn draft(title: &str, content: &str, committee: &str) -> PostDraft {
    PostDraft {
        title: title.to_string(),
        content: content.to_string(),
        committee: committee.to_string(),
        ..PostDraft::default()
    }
}

#[test]
fn create_post_fills_slug_excerpt_and_committee() {
    let conn = open_db_in_memory().unwrap();
    let service = PostService::new(SqlitePostRepository::new(&conn));

    let post = service
        .create_post(
            &draft(
                "Spring Gala 2025",
                "# Join us\nDinner **and** dancing.",
                "/Sports-Committee.html",
            ),
            day(10),
        )
        .unwrap();
    assert_eq!(post.slug, "spring-gala-2025");
    assert_eq!(post.excerpt, "Join us\nDinner and dancing.");
    assert_eq!(post.committee, "sports");
    assert_eq!(post.committee_label(), "Sports Committee");
    assert_eq!(post.date, day(10));

    let unknown = service
        .create_post(&draft("Misc", "body", "chess club"), day(10))
        .unwrap();
    assert_eq!(unknown.committee, "");
}

#[test]
fn duplicate_titles_get_numbered_slugs_that_survive_edits() {
    let conn = open_db_in_memory().unwrap();
    let service = PostService::new(SqlitePostRepository::new(&conn));

    let first = service.create_post(&draft("Recap", "one", ""), day(1)).unwrap();
    let second = service.create_post(&draft("Recap", "two", ""), day(2)).unwrap();
    let third = service.create_post(&draft("Recap", "three", ""), day(3)).unwrap();
    assert_eq!(first.slug, "recap");
    assert_eq!(second.slug, "recap-1");
    assert_eq!(third.slug, "recap-2");

    let mut edit = draft("Completely new title", "updated", "art");
    edit.excerpt = "Hand written".to_string();
    let edited = service.update_post(second.id, &edit).unwrap();
    assert_eq!(edited.slug, "recap-1");
    assert_eq!(edited.title, "Completely new title");
    assert_eq!(edited.excerpt, "Hand written");
    assert_eq!(edited.date, day(2));

    let titles: Vec<String> = service
        .list_posts()
        .unwrap()
        .into_iter()
        .map(|post| post.slug)
        .collect();
    assert_eq!(titles, vec!["recap-2", "recap-1", "recap"]);
}

#[test]
fn invalid_drafts_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = PostService::new(SqlitePostRepository::new(&conn));

    let mut bad_thumbnail = draft("Title", "content", "");
    bad_thumbnail.thumbnail = "not a url".to_string();
    assert!(matches!(
        service.create_post(&bad_thumbnail, day(1)),
        Err(PostServiceError::Validation(_))
    ));
    assert!(matches!(
        service.create_post(&draft("Title", "   ", ""), day(1)),
        Err(PostServiceError::Validation(_))
    ));
    assert!(matches!(
        service.update_post(404, &draft("Title", "content", "")),
        Err(PostServiceError::PostNotFound(404))
    ));
}

#[test]
fn gallery_tracks_post_content_and_survives_post_deletion() {
    let conn = open_db_in_memory().unwrap();
    let service = PostService::new(SqlitePostRepository::new(&conn));

    let content = "![Stage photo](https://cdn.example.com/stage.jpg)\n\
                   [Highlights](https://www.youtube.com/watch?v=dQw4w9WgXcQ)";
    let post = service
        .create_post(&draft("Gala", content, "social"), day(5))
        .unwrap();

    let all = service.list_media(&MediaFilter::default()).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|item| item.post_slug.as_deref() == Some("gala")));

    let videos = service
        .list_media(&MediaFilter {
            media_type: "video".to_string(),
            search: String::new(),
        })
        .unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].media.media_type, MediaType::Video);
    assert_eq!(
        videos[0].media.thumbnail,
        "https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
    );

    let searched = service
        .list_media(&MediaFilter {
            media_type: String::new(),
            search: "STAGE".to_string(),
        })
        .unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].media.title, "Stage photo");

    let unknown_type = service
        .list_media(&MediaFilter {
            media_type: "audio".to_string(),
            search: String::new(),
        })
        .unwrap();
    assert!(unknown_type.is_empty());

    service
        .update_post(post.id, &draft("Gala", "![Only](https://cdn.example.com/only.png)", "social"))
        .unwrap();
    let replaced = service.list_media(&MediaFilter::default()).unwrap();
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0].media.url, "https://cdn.example.com/only.png");

    service.delete_post(post.id).unwrap();
    let detached = service.list_media(&MediaFilter::default()).unwrap();
    assert_eq!(detached.len(), 1);
    assert_eq!(detached[0].media.post_id, None);
    assert_eq!(detached[0].post_slug, None);
}

#[test]
fn detail_renders_markdown_and_committee_pages_filter_posts() {
    let conn = open_db_in_memory().unwrap();
    let service = PostService::new(SqlitePostRepository::new(&conn));
    service
        .create_post(&draft("Match day", "**Final** tonight", "athletics"), day(7))
        .unwrap();
    service
        .create_post(&draft("Poetry night", "Verses", "cultural"), day(8))
        .unwrap();

    let detail = service.post_detail("match-day").unwrap();
    assert!(detail.rendered_content.contains("<strong>Final</strong>"));
    assert_eq!(detail.committee_label, "Sports Committee");
    assert!(matches!(
        service.post_detail("missing"),
        Err(PostServiceError::SlugNotFound(_))
    ));

    let sports = service.committee_posts("sports.html").unwrap();
    assert_eq!(sports.committee.key, "sports");
    assert_eq!(sports.posts.len(), 1);
    assert_eq!(sports.posts[0].title, "Match day");
    assert!(matches!(
        service.committee_posts("chess"),
        Err(PostServiceError::CommitteeNotFound(_))
    ));
}

#[test]
fn videos_list_newest_first_and_validate_urls() {
    let conn = open_db_in_memory().unwrap();
    let service = VideoService::new(SqliteVideoRepository::new(&conn));

    let first = service
        .create_video(&VideoDraft {
            title: "Orientation".to_string(),
            url: "https://videos.example.com/orientation".to_string(),
            image: "https://cdn.example.com/orientation.jpg".to_string(),
        })
        .unwrap();
    let second = service
        .create_video(&VideoDraft {
            title: "Finals".to_string(),
            url: "https://videos.example.com/finals".to_string(),
            image: "https://cdn.example.com/finals.jpg".to_string(),
        })
        .unwrap();

    let ids: Vec<i64> = service
        .list_videos()
        .unwrap()
        .into_iter()
        .map(|video| video.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);

    assert!(matches!(
        service.create_video(&VideoDraft {
            title: "Broken".to_string(),
            url: "videos/broken".to_string(),
            image: "https://cdn.example.com/x.jpg".to_string(),
        }),
        Err(VideoServiceError::Validation(_))
    ));

    service.delete_video(first.id).unwrap();
    assert!(matches!(
        service.get_video(first.id),
        Err(VideoServiceError::VideoNotFound(_))
    ));
}
