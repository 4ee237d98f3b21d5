#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use newsroom::application::comments::CreateCommentCommand;
use newsroom::application::context::{AppContext, Repositories};
use newsroom::application::pagination::PageSpec;
use newsroom::application::posts::CreatePostCommand;
use newsroom::cache::CacheConfig;
use newsroom::domain::entities::{CommentRecord, PostRecord, UserRecord};
use newsroom::domain::types::{CommentId, PostId, UserId};
use newsroom::infra::images::FsImageStore;
use newsroom::infra::memory::InMemoryStore;
use tempfile::TempDir;

pub struct Fixture {
    pub ctx: AppContext,
    pub store: Arc<InMemoryStore>,
    pub images: Arc<FsImageStore>,
    pub pictures: Arc<FsImageStore>,
    pub author: UserRecord,
    _images_dir: TempDir,
}

pub fn fixture() -> Fixture {
    fixture_with(CacheConfig::default())
}

pub fn fixture_with(cache: CacheConfig) -> Fixture {
    let images_dir = tempfile::tempdir().expect("temp dir");
    let images = Arc::new(
        FsImageStore::new(images_dir.path().join("post-images")).expect("image store"),
    );
    let pictures = Arc::new(
        FsImageStore::new(images_dir.path().join("user-pictures")).expect("picture store"),
    );
    let store = Arc::new(InMemoryStore::new());
    let author = store
        .create_user("Ada", "Lovelace", "ada")
        .expect("author created");
    let ctx = AppContext::new(
        Repositories::from_shared(store.clone()),
        images.clone(),
        pictures.clone(),
        &cache,
    );

    Fixture {
        ctx,
        store,
        images,
        pictures,
        author,
        _images_dir: images_dir,
    }
}

pub fn page(n: u32) -> PageSpec {
    PageSpec::new(n, 10).expect("valid page spec")
}

impl Fixture {
    pub fn user(&self, username: &str) -> UserRecord {
        self.store
            .create_user("Test", "User", username)
            .expect("user created")
    }

    pub async fn post(&self, title: &str) -> PostRecord {
        self.post_by(self.author.id, title, None).await
    }

    pub async fn post_by(
        &self,
        author_id: UserId,
        title: &str,
        image_url: Option<String>,
    ) -> PostRecord {
        self.ctx
            .posts
            .create_post(CreatePostCommand {
                title: title.to_string(),
                description: format!("About {title}"),
                tags: BTreeSet::from(["news".to_string()]),
                content: format!("Body of {title}"),
                author_id,
                image_url,
            })
            .await
            .expect("post created")
    }

    pub async fn comment(&self, post_id: PostId, parent_id: Option<CommentId>) -> CommentRecord {
        self.ctx
            .comments
            .create_comment(CreateCommentCommand {
                post_id,
                parent_id,
                author_id: self.author.id,
                content: "Nice read".to_string(),
            })
            .await
            .expect("comment created")
    }
}
