//! Conflict resolution when an upload hits a newer remote version.
//!
//! # Tiers
//!
//! 1. **Detection**: a stale etag captures both sides and prompts.
//! 2. **Prompt choices**: compare, overwrite, dismiss.
//! 3. **Diff resolution**: overwrite or use remote from the diff view.
//! 4. **Saving after resolution**: every resolution leaves an etag the
//!    remote accepts on the next save.

mod common;

use common::{PROFILE, ProviderFixture, uri};
use mfvfs_kernel::remote::RemoteError;
use mfvfs_kernel::surface::Severity;
use mfvfs_kernel::vfs::{
    COMPARE_LABEL, CONFLICT_MESSAGE, ConflictState, OVERWRITE_LABEL, VfsError, WriteOptions,
};
use mfvfs_types::ResourceUri;

// ============================================================================
// Shared test setup
// ============================================================================

/// Cache `a.txt` as "base", then change it remotely to "theirs".
async fn diverged() -> (ProviderFixture, ResourceUri) {
    let fx = ProviderFixture::new();
    let a = fx.cached_file(&format!("/{PROFILE}/a.txt"), b"base").await;
    fx.api.put_file("/a.txt", b"theirs");
    (fx, a)
}

/// Save `local` over a diverged file, answering the prompt with `choice`.
async fn save_into_conflict(
    fx: &ProviderFixture,
    a: &ResourceUri,
    local: &[u8],
    choice: Option<&str>,
) {
    fx.prompts.answer(choice);
    fx.provider
        .write_file(a, local.to_vec(), WriteOptions::upsert())
        .await
        .expect("conflicting save resolves without error");
}

/// Save `next` after a resolution and check it lands without a new prompt.
async fn save_after_resolution(fx: &ProviderFixture, a: &ResourceUri, next: &[u8]) {
    let prompts_before = fx.prompts.messages.lock().len();
    fx.provider
        .write_file(a, next.to_vec(), WriteOptions::upsert())
        .await
        .expect("save after resolution");

    assert_eq!(
        fx.prompts.messages.lock().len(),
        prompts_before,
        "save after resolution conflicted again"
    );
    assert_eq!(fx.api.file("/a.txt").as_deref(), Some(next));
    assert_eq!(cached_etag(fx, a), fx.api.etag("/a.txt"));
    assert_eq!(file_state(fx, a), (Some(next.to_vec()), ConflictState::Clean));
}

fn file_state(fx: &ProviderFixture, a: &ResourceUri) -> (Option<Vec<u8>>, ConflictState) {
    let tree = fx.provider.tree();
    let id = tree.lookup_as_file(a).expect("entry cached");
    let file = tree.get(id).and_then(|e| e.as_file()).expect("file entry");
    (file.data.clone(), file.conflict_state())
}

fn cached_etag(fx: &ProviderFixture, a: &ResourceUri) -> Option<String> {
    let tree = fx.provider.tree();
    let id = tree.lookup_as_file(a).ok()?;
    tree.get(id)?.as_file()?.etag.clone()
}

// ============================================================================
// Tier 1: detection
// ============================================================================

#[tokio::test]
async fn test_stale_etag_prompts_with_both_choices() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", None).await;

    let messages = fx.prompts.messages.lock();
    assert_eq!(messages.len(), 1);
    let (text, opts) = &messages[0];
    assert_eq!(text, CONFLICT_MESSAGE);
    assert_eq!(opts.items, vec![COMPARE_LABEL, OVERWRITE_LABEL]);
    assert_eq!(opts.severity, Severity::Warning);
    assert_eq!(fx.api.file("/a.txt").as_deref(), Some(&b"theirs"[..]));
}

#[tokio::test]
async fn test_remote_fetch_failure_leaves_entry_untouched() {
    let (fx, a) = diverged().await;
    fx.api.fail_next("get", RemoteError::transport("socket closed"));

    let err = fx
        .provider
        .write_file(&a, b"mine".to_vec(), WriteOptions::upsert())
        .await
        .unwrap_err();
    assert!(matches!(err, VfsError::Remote(RemoteError::Transport(_))));

    let (data, state) = file_state(&fx, &a);
    assert_eq!(data.as_deref(), Some(&b"base"[..]));
    assert_eq!(state, ConflictState::Clean);
    assert!(fx.prompts.messages.lock().is_empty());
}

// ============================================================================
// Tier 2: prompt choices
// ============================================================================

#[tokio::test]
async fn test_compare_opens_tagged_diff() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", Some(COMPARE_LABEL)).await;

    let diffs = fx.prompts.diffs.lock().clone();
    assert_eq!(diffs.len(), 1);
    let (left, right, title) = &diffs[0];
    assert_eq!(left.to_string(), "zowe-uss:/sestest/a.txt?conflict=true");
    assert_eq!(right.to_string(), "zowe-uss:/sestest/a.txt?inDiff=true");
    assert_eq!(title, "a.txt (Remote) ↔ a.txt");

    assert_eq!(fx.provider.read_file(left).await.unwrap(), b"theirs");
    assert_eq!(fx.provider.read_file(right).await.unwrap(), b"mine");
    let (_, state) = file_state(&fx, &a);
    assert_eq!(state, ConflictState::AwaitingUserChoice);
}

#[tokio::test]
async fn test_edits_in_diff_view_stay_local() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", Some(COMPARE_LABEL)).await;
    fx.api.clear_calls();

    fx.provider
        .write_file(&a, b"mine, revised".to_vec(), WriteOptions::upsert())
        .await
        .unwrap();

    assert_eq!(fx.api.count("upload"), 0);
    let local = a.with_query(Some("inDiff=true"));
    assert_eq!(fx.provider.read_file(&local).await.unwrap(), b"mine, revised");
}

#[tokio::test]
async fn test_prompt_overwrite_uploads_local() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", Some(OVERWRITE_LABEL)).await;

    assert_eq!(fx.api.file("/a.txt").as_deref(), Some(&b"mine"[..]));
    let (data, state) = file_state(&fx, &a);
    assert_eq!(data.as_deref(), Some(&b"mine"[..]));
    assert_eq!(state, ConflictState::Clean);
    assert_eq!(cached_etag(&fx, &a), fx.api.etag("/a.txt"));
    assert!(
        !fx.editor.actions().contains(&"close_active".to_string()),
        "no diff was open"
    );
}

#[tokio::test]
async fn test_dismiss_keeps_edit_locally() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", None).await;

    let (data, state) = file_state(&fx, &a);
    assert_eq!(data.as_deref(), Some(&b"mine"[..]));
    assert_eq!(state, ConflictState::Clean);
    assert_eq!(fx.api.file("/a.txt").as_deref(), Some(&b"theirs"[..]));
    assert!(fx.prompts.diffs.lock().is_empty());
}

#[tokio::test]
async fn test_closing_diff_keeps_local_edit() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", Some(COMPARE_LABEL)).await;

    assert!(fx.provider.close_diff(&a).unwrap());
    let (data, state) = file_state(&fx, &a);
    assert_eq!(data.as_deref(), Some(&b"mine"[..]));
    assert_eq!(state, ConflictState::Clean);
    assert!(!fx.provider.close_diff(&a).unwrap());
}

// ============================================================================
// Tier 3: diff resolution
// ============================================================================

#[tokio::test]
async fn test_diff_overwrite_pushes_local_and_takes_confirmed_etag() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", Some(COMPARE_LABEL)).await;

    fx.provider.diff_overwrite(&a).await.unwrap();

    assert_eq!(fx.api.file("/a.txt").as_deref(), Some(&b"mine"[..]));
    assert_eq!(cached_etag(&fx, &a), fx.api.etag("/a.txt"));
    let (data, state) = file_state(&fx, &a);
    assert_eq!(data.as_deref(), Some(&b"mine"[..]));
    assert_eq!(state, ConflictState::Clean);
    assert!(fx.editor.actions().contains(&"close_active".to_string()));
    let status = fx.prompts.status.lock().clone();
    assert_eq!(status[0].0, "Overwrite applied for a.txt");
}

#[tokio::test]
async fn test_use_remote_with_identical_content_skips_network() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"theirs", Some(COMPARE_LABEL)).await;
    fx.api.clear_calls();

    fx.provider.diff_use_remote(&a).await.unwrap();

    assert!(fx.api.calls().is_empty(), "got {:?}", fx.api.calls());
    let (data, state) = file_state(&fx, &a);
    assert_eq!(data.as_deref(), Some(&b"theirs"[..]));
    assert_eq!(state, ConflictState::Clean);
    assert_eq!(fx.editor.actions(), vec!["close_active"]);
}

#[tokio::test]
async fn test_use_remote_with_different_content_reverts_editor() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", Some(COMPARE_LABEL)).await;

    fx.provider.diff_use_remote(&a).await.unwrap();

    assert_eq!(fx.api.file("/a.txt").as_deref(), Some(&b"theirs"[..]));
    assert_eq!(cached_etag(&fx, &a), fx.api.etag("/a.txt"));
    let (data, state) = file_state(&fx, &a);
    assert_eq!(data.as_deref(), Some(&b"theirs"[..]));
    assert_eq!(state, ConflictState::Clean);
    assert_eq!(fx.editor.actions(), vec!["close_active", "revert"]);
    let status = fx.prompts.status.lock().clone();
    assert_eq!(status[0].0, "Used remote content for a.txt");
}

#[tokio::test]
async fn test_use_remote_without_conflict_is_noop() {
    let (fx, a) = diverged().await;
    fx.api.clear_calls();

    fx.provider.diff_use_remote(&a).await.unwrap();
    assert!(fx.api.calls().is_empty());
    assert!(fx.editor.actions().is_empty());
}

// ============================================================================
// Tier 4: saving after resolution
// ============================================================================

#[tokio::test]
async fn test_save_after_prompt_overwrite() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", Some(OVERWRITE_LABEL)).await;

    save_after_resolution(&fx, &a, b"next").await;
}

#[tokio::test]
async fn test_save_after_diff_overwrite() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", Some(COMPARE_LABEL)).await;
    fx.provider.diff_overwrite(&a).await.unwrap();

    save_after_resolution(&fx, &a, b"next").await;
}

#[tokio::test]
async fn test_use_remote_with_identical_content_adopts_remote_etag() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"theirs", Some(COMPARE_LABEL)).await;
    fx.provider.diff_use_remote(&a).await.unwrap();

    assert_eq!(cached_etag(&fx, &a), fx.api.etag("/a.txt"));
    save_after_resolution(&fx, &a, b"next").await;
}

#[tokio::test]
async fn test_save_after_use_remote_with_different_content() {
    let (fx, a) = diverged().await;
    save_into_conflict(&fx, &a, b"mine", Some(COMPARE_LABEL)).await;
    fx.provider.diff_use_remote(&a).await.unwrap();

    save_after_resolution(&fx, &a, b"next").await;
}
