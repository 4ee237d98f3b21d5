//! Parent/child navigation over the comment forest of a post.

use std::collections::HashSet;
use std::sync::Arc;

use crate::application::repos::{CommentsRepo, RepoError};
use crate::domain::types::{CommentId, PostId};

#[derive(Clone)]
pub struct CommentTree {
    comments: Arc<dyn CommentsRepo>,
}

impl CommentTree {
    pub fn new(comments: Arc<dyn CommentsRepo>) -> Self {
        Self { comments }
    }

    /// Direct children of `comment_id`. Empty for a leaf.
    pub async fn children_of(
        &self,
        post_id: PostId,
        comment_id: CommentId,
    ) -> Result<Vec<CommentId>, RepoError> {
        self.comments.child_comment_ids(post_id, comment_id).await
    }

    pub async fn roots_of(&self, post_id: PostId) -> Result<Vec<CommentId>, RepoError> {
        self.comments.root_comment_ids(post_id).await
    }

    /// Lazy post-order walk of the subtree rooted at `root`.
    pub fn walk(&self, post_id: PostId, root: CommentId) -> SubtreeWalk<'_> {
        SubtreeWalk {
            tree: self,
            post_id,
            stack: vec![Frame {
                id: root,
                expanded: false,
            }],
            visited: HashSet::new(),
        }
    }

    /// Every id of the subtree, leaves before their ancestors, `root` last.
    pub async fn post_order(
        &self,
        post_id: PostId,
        root: CommentId,
    ) -> Result<Vec<CommentId>, RepoError> {
        let mut walk = self.walk(post_id, root);
        let mut ids = Vec::new();
        while let Some(id) = walk.next().await? {
            ids.push(id);
        }
        Ok(ids)
    }
}

struct Frame {
    id: CommentId,
    expanded: bool,
}

/// Explicit-stack depth-first traversal.
///
/// Children of a node are fetched when the node is first reached and the node
/// itself is yielded only after its whole subtree. Siblings are yielded in
/// repository order. A caller may delete each yielded id before asking for
/// the next one.
pub struct SubtreeWalk<'a> {
    tree: &'a CommentTree,
    post_id: PostId,
    stack: Vec<Frame>,
    visited: HashSet<CommentId>,
}

impl SubtreeWalk<'_> {
    pub async fn next(&mut self) -> Result<Option<CommentId>, RepoError> {
        while let Some(frame) = self.stack.pop() {
            if frame.expanded {
                return Ok(Some(frame.id));
            }

            if !self.visited.insert(frame.id) {
                return Err(RepoError::integrity(format!(
                    "comment `{}` appears twice in the subtree of post `{}`",
                    frame.id, self.post_id
                )));
            }

            let children = self.tree.children_of(self.post_id, frame.id).await?;
            self.stack.push(Frame {
                id: frame.id,
                expanded: true,
            });
            self.stack.extend(children.into_iter().rev().map(|id| Frame {
                id,
                expanded: false,
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::application::pagination::{Page, PageSpec};
    use crate::domain::entities::CommentRecord;

    /// Adjacency-only repository: `(post_id, parent) -> children`.
    struct Forest {
        edges: HashMap<(PostId, Option<CommentId>), Vec<CommentId>>,
    }

    impl Forest {
        fn new(edges: &[(PostId, Option<CommentId>, &[CommentId])]) -> Arc<Self> {
            Arc::new(Self {
                edges: edges
                    .iter()
                    .map(|(post, parent, children)| ((*post, *parent), children.to_vec()))
                    .collect(),
            })
        }

        fn ids(&self, post_id: PostId, parent: Option<CommentId>) -> Vec<CommentId> {
            self.edges.get(&(post_id, parent)).cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl CommentsRepo for Forest {
        async fn exists_comment(&self, _: PostId, _: CommentId) -> Result<bool, RepoError> {
            Ok(true)
        }

        async fn root_comment_ids(&self, post_id: PostId) -> Result<Vec<CommentId>, RepoError> {
            Ok(self.ids(post_id, None))
        }

        async fn child_comment_ids(
            &self,
            post_id: PostId,
            parent_id: CommentId,
        ) -> Result<Vec<CommentId>, RepoError> {
            Ok(self.ids(post_id, Some(parent_id)))
        }

        async fn list_root_comments(
            &self,
            _: PostId,
            page: &PageSpec,
        ) -> Result<Page<CommentRecord>, RepoError> {
            Ok(Page::empty(page))
        }

        async fn list_child_comments(
            &self,
            _: PostId,
            _: CommentId,
            page: &PageSpec,
        ) -> Result<Page<CommentRecord>, RepoError> {
            Ok(Page::empty(page))
        }
    }

    #[tokio::test]
    async fn post_order_yields_leaves_before_ancestors() {
        // 1 -> [2, 3], 2 -> [4, 5], 3 -> [6]
        let forest = Forest::new(&[
            (7, None, &[1]),
            (7, Some(1), &[2, 3]),
            (7, Some(2), &[4, 5]),
            (7, Some(3), &[6]),
        ]);
        let tree = CommentTree::new(forest);

        let order = tree.post_order(7, 1).await.expect("walk succeeds");

        assert_eq!(order, vec![4, 5, 2, 6, 3, 1]);
        assert_eq!(tree.roots_of(7).await.expect("roots"), vec![1]);
    }

    #[tokio::test]
    async fn leaf_walk_yields_only_itself() {
        let tree = CommentTree::new(Forest::new(&[]));
        assert_eq!(tree.post_order(1, 9).await.expect("walk"), vec![9]);
    }

    #[tokio::test]
    async fn deep_chains_do_not_recurse() {
        let chain: Vec<(PostId, Option<CommentId>, Vec<CommentId>)> =
            (1..10_000).map(|id| (1, Some(id), vec![id + 1])).collect();
        let edges: Vec<_> = chain
            .iter()
            .map(|(post, parent, children)| (*post, *parent, children.as_slice()))
            .collect();
        let tree = CommentTree::new(Forest::new(&edges));

        let order = tree.post_order(1, 1).await.expect("walk succeeds");

        assert_eq!(order.len(), 10_000);
        assert_eq!(order.first(), Some(&10_000));
        assert_eq!(order.last(), Some(&1));
    }

    #[tokio::test]
    async fn cycles_are_reported_as_integrity_errors() {
        let tree = CommentTree::new(Forest::new(&[(1, Some(1), &[2]), (1, Some(2), &[1])]));

        let result = tree.post_order(1, 1).await;

        assert!(matches!(result, Err(RepoError::Integrity { .. })));
    }
}
