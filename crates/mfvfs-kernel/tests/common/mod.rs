//! Recording fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mfvfs_kernel::auth::{AuthHandler, AuthMethods, MutexRegistry};
use mfvfs_kernel::config::{AuthConfig, ProviderConfig};
use mfvfs_kernel::remote::{
    ApiRegistry, ContentsResponse, CreateKind, FileApi, GetContentsOptions, RemoteError,
    RemoteItem, RemoteResult, UploadOptions, UploadResponse,
};
use mfvfs_kernel::surface::{
    EditorSurface, MessageOptions, ProfileTree, PromptSurface, RefreshError, ResourceRefresher,
    SurfaceError, TabInfo, TreeKind, TreeProviders,
};
use mfvfs_kernel::vfs::FsProvider;
use mfvfs_types::{Profile, ProfileRef, ResourceUri};
use parking_lot::Mutex;

pub const SCHEME: &str = "zowe-uss";
pub const PROFILE: &str = "sestest";

pub fn uri(path: &str) -> ResourceUri {
    ResourceUri::new(SCHEME, path)
}

pub fn profile() -> Profile {
    Profile::new(PROFILE, "zosmf").with_credentials("ibmuser", "secret")
}

// ============================================================================
// Remote API
// ============================================================================

#[derive(Clone)]
struct RemoteFile {
    data: Vec<u8>,
    version: u64,
}

/// In-memory remote with etags, call recording and error injection.
pub struct FakeFileApi {
    profile: Profile,
    files: Mutex<HashMap<String, RemoteFile>>,
    listings: Mutex<HashMap<String, Vec<RemoteItem>>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, VecDeque<RemoteError>>>,
    supports_move: bool,
}

impl FakeFileApi {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            files: Mutex::new(HashMap::new()),
            listings: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            supports_move: true,
        }
    }

    pub fn without_move(mut self) -> Self {
        self.supports_move = false;
        self
    }

    /// Store a file as if someone else wrote it. Bumps the etag.
    pub fn put_file(&self, path: &str, data: &[u8]) {
        let mut files = self.files.lock();
        let version = files.get(path).map_or(1, |f| f.version + 1);
        files.insert(
            path.to_string(),
            RemoteFile {
                data: data.to_vec(),
                version,
            },
        );
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(path).map(|f| f.data.clone())
    }

    pub fn etag(&self, path: &str) -> Option<String> {
        self.files.lock().get(path).map(|f| etag_for(f.version))
    }

    pub fn set_listing(&self, path: &str, items: Vec<RemoteItem>) {
        self.listings.lock().insert(path.to_string(), items);
    }

    /// Make the next call of `op` (e.g. `"upload"`) fail with `error`.
    pub fn fail_next(&self, op: &str, error: RemoteError) {
        self.failures
            .lock()
            .entry(op.to_string())
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls of one operation, e.g. `"upload"`.
    pub fn count(&self, op: &str) -> usize {
        let prefix = format!("{op} ");
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, op: &str, path: &str) -> RemoteResult<()> {
        self.calls.lock().push(format!("{op} {path}"));
        match self.failures.lock().get_mut(op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn etag_for(version: u64) -> String {
    format!("etag-{version}")
}

pub fn item(name: &str, mode: &str) -> RemoteItem {
    RemoteItem {
        name: name.to_string(),
        mode: mode.to_string(),
        size: 0,
        user: Some("ibmuser".to_string()),
        group: Some("sys1".to_string()),
    }
}

#[async_trait]
impl FileApi for FakeFileApi {
    fn profile(&self) -> &Profile {
        &self.profile
    }

    async fn get_contents(
        &self,
        path: &str,
        opts: GetContentsOptions,
    ) -> RemoteResult<ContentsResponse> {
        self.record("get", path)?;
        let files = self.files.lock();
        let file = files
            .get(path)
            .ok_or_else(|| RemoteError::from_http(404, format!("{path} not found")))?;
        Ok(ContentsResponse {
            data: file.data.clone(),
            etag: opts.return_etag.then(|| etag_for(file.version)),
        })
    }

    async fn upload_buffer_as_file(
        &self,
        data: &[u8],
        path: &str,
        opts: UploadOptions,
    ) -> RemoteResult<UploadResponse> {
        self.record("upload", path)?;
        let mut files = self.files.lock();
        let current = files.get(path).map(|f| f.version);
        if let (Some(expected), Some(version)) = (&opts.etag, current) {
            if *expected != etag_for(version) {
                return Err(RemoteError::from_http(412, "etag mismatch"));
            }
        }
        let version = current.map_or(1, |v| v + 1);
        files.insert(
            path.to_string(),
            RemoteFile {
                data: data.to_vec(),
                version,
            },
        );
        Ok(UploadResponse {
            etag: opts.return_etag.then(|| etag_for(version)),
            command_response: "uploaded".to_string(),
        })
    }

    async fn file_list(&self, path: &str) -> RemoteResult<Vec<RemoteItem>> {
        self.record("list", path)?;
        Ok(self.listings.lock().get(path).cloned().unwrap_or_default())
    }

    async fn delete(&self, path: &str, _recursive: bool) -> RemoteResult<()> {
        self.record("delete", path)?;
        self.files.lock().remove(path);
        Ok(())
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> RemoteResult<()> {
        self.record("rename", old_path)?;
        let mut files = self.files.lock();
        if let Some(file) = files.remove(old_path) {
            files.insert(new_path.to_string(), file);
        }
        Ok(())
    }

    async fn move_entry(&self, old_path: &str, new_path: &str) -> RemoteResult<()> {
        if !self.supports_move {
            return Err(RemoteError::Unsupported("move"));
        }
        self.record("move", old_path)?;
        let mut files = self.files.lock();
        if let Some(file) = files.remove(old_path) {
            files.insert(new_path.to_string(), file);
        }
        Ok(())
    }

    async fn create(&self, path: &str, _kind: CreateKind) -> RemoteResult<()> {
        self.record("create", path)
    }
}

// ============================================================================
// Host surfaces
// ============================================================================

/// Prompt surface answering from a script.
#[derive(Default)]
pub struct FakePrompts {
    answers: Mutex<VecDeque<Option<String>>>,
    pub messages: Mutex<Vec<(String, MessageOptions)>>,
    pub diffs: Mutex<Vec<(ResourceUri, ResourceUri, String)>>,
    pub status: Mutex<Vec<(String, Duration)>>,
}

impl FakePrompts {
    /// Queue the answer for the next `show_message`. `None` dismisses.
    pub fn answer(&self, choice: Option<&str>) {
        self.answers.lock().push_back(choice.map(str::to_string));
    }

    pub fn message_texts(&self) -> Vec<String> {
        self.messages.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl PromptSurface for FakePrompts {
    async fn show_message(&self, text: &str, opts: MessageOptions) -> Option<String> {
        self.messages.lock().push((text.to_string(), opts));
        self.answers.lock().pop_front().flatten()
    }

    async fn show_diff(
        &self,
        left: &ResourceUri,
        right: &ResourceUri,
        title: &str,
    ) -> Result<(), SurfaceError> {
        self.diffs
            .lock()
            .push((left.clone(), right.clone(), title.to_string()));
        Ok(())
    }

    fn set_status_bar_message(&self, text: &str, timeout: Duration) {
        self.status.lock().push((text.to_string(), timeout));
    }
}

/// Editor with a fixed set of tabs; records every action.
#[derive(Default)]
pub struct FakeEditor {
    pub tabs: Mutex<Vec<TabInfo>>,
    pub actions: Mutex<Vec<String>>,
}

impl FakeEditor {
    pub fn open_tab(&self, uri: ResourceUri, view_column: Option<u32>) {
        self.tabs.lock().push(TabInfo {
            uri,
            view_column,
            is_dirty: false,
        });
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().clone()
    }
}

#[async_trait]
impl EditorSurface for FakeEditor {
    fn open_tabs(&self) -> Vec<TabInfo> {
        self.tabs.lock().clone()
    }

    async fn close_tab(&self, tab: &TabInfo) -> Result<(), SurfaceError> {
        self.tabs.lock().retain(|t| t.uri != tab.uri);
        self.actions.lock().push(format!("close_tab {}", tab.uri));
        Ok(())
    }

    async fn open_with(
        &self,
        uri: &ResourceUri,
        view_column: Option<u32>,
    ) -> Result<(), SurfaceError> {
        self.actions
            .lock()
            .push(format!("open {uri} column={view_column:?}"));
        Ok(())
    }

    async fn revert_active(&self) -> Result<(), SurfaceError> {
        self.actions.lock().push("revert".to_string());
        Ok(())
    }

    async fn close_active_editor(&self) -> Result<(), SurfaceError> {
        self.actions.lock().push("close_active".to_string());
        Ok(())
    }
}

/// Records which profiles were refreshed.
#[derive(Default)]
pub struct FakeRefresher {
    pub editors: Mutex<Vec<String>>,
    pub workspaces: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl ResourceRefresher for FakeRefresher {
    async fn reload_active_editor_for_profile(
        &self,
        profile_name: &str,
    ) -> Result<(), RefreshError> {
        self.editors.lock().push(profile_name.to_string());
        if self.fail {
            return Err(RefreshError::Editors {
                profile: profile_name.to_string(),
                reason: "editor gone".to_string(),
            });
        }
        Ok(())
    }

    async fn reload_workspaces_for_profile(&self, profile_name: &str) -> Result<(), RefreshError> {
        self.workspaces.lock().push(profile_name.to_string());
        Ok(())
    }
}

/// A tree view that may or may not show a profile node.
pub struct FakeTree {
    kind: TreeKind,
    node: Option<String>,
    pub updated: Mutex<Vec<Profile>>,
}

impl FakeTree {
    pub fn new(kind: TreeKind, node: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            node: node.map(str::to_string),
            updated: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ProfileTree for FakeTree {
    fn kind(&self) -> TreeKind {
        self.kind
    }

    async fn set_profile_to_choice(&self, profile: &Profile) -> bool {
        if self.node.as_deref() != Some(profile.name.as_str()) {
            return false;
        }
        self.updated.lock().push(profile.clone());
        true
    }
}

pub struct FakeTrees(pub Vec<Arc<FakeTree>>);

impl TreeProviders for FakeTrees {
    fn providers(&self) -> Vec<Arc<dyn ProfileTree>> {
        self.0
            .iter()
            .map(|t| Arc::clone(t) as Arc<dyn ProfileTree>)
            .collect()
    }
}

/// Scripted re-authentication callbacks.
#[derive(Default)]
pub struct FakeAuthMethods {
    pub sso_result: bool,
    pub credentials: Option<Profile>,
    pub sso_calls: Mutex<Vec<String>>,
    pub credential_calls: Mutex<Vec<String>>,
}

#[async_trait]
impl AuthMethods for FakeAuthMethods {
    async fn sso_login(&self, profile_name: &str) -> bool {
        self.sso_calls.lock().push(profile_name.to_string());
        self.sso_result
    }

    async fn prompt_credentials(&self, profile: &ProfileRef, _re_prompt: bool) -> Option<Profile> {
        self.credential_calls.lock().push(profile.name().to_string());
        self.credentials.clone()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub struct ProviderFixture {
    pub provider: Arc<FsProvider>,
    pub api: Arc<FakeFileApi>,
    pub prompts: Arc<FakePrompts>,
    pub editor: Arc<FakeEditor>,
}

impl ProviderFixture {
    pub fn new() -> Self {
        Self::with_api(FakeFileApi::new(profile()))
    }

    pub fn with_api(api: FakeFileApi) -> Self {
        mfvfs_telemetry::init_test_tracing();
        let api = Arc::new(api);
        let apis = Arc::new(ApiRegistry::new());
        apis.register(Arc::clone(&api) as Arc<dyn FileApi>);
        let prompts = Arc::new(FakePrompts::default());
        let editor = Arc::new(FakeEditor::default());
        let provider = Arc::new(FsProvider::new(
            SCHEME,
            apis,
            Arc::clone(&prompts) as Arc<dyn PromptSurface>,
            Arc::clone(&editor) as Arc<dyn EditorSurface>,
            ProviderConfig::default(),
        ));
        provider
            .mount_profile(api.profile().clone())
            .expect("mount profile");
        Self {
            provider,
            api,
            prompts,
            editor,
        }
    }

    /// Put a file on the remote and read it once so the cache holds it.
    pub async fn cached_file(&self, path: &str, data: &[u8]) -> ResourceUri {
        let remote_path = path
            .strip_prefix(&format!("/{PROFILE}"))
            .unwrap_or(path)
            .to_string();
        self.api.put_file(&remote_path, data);
        let uri = uri(path);
        self.provider.read_file(&uri).await.expect("initial read");
        uri
    }
}

pub struct AuthFixture {
    pub auth: Arc<AuthHandler>,
    pub registry: Arc<MutexRegistry>,
    pub prompts: Arc<FakePrompts>,
    pub refresher: Arc<FakeRefresher>,
    pub trees: Vec<Arc<FakeTree>>,
}

impl AuthFixture {
    pub fn new() -> Self {
        Self::with_trees(vec![
            FakeTree::new(TreeKind::Ds, Some(PROFILE)),
            FakeTree::new(TreeKind::Uss, Some(PROFILE)),
            FakeTree::new(TreeKind::Job, None),
        ])
    }

    pub fn with_trees(trees: Vec<Arc<FakeTree>>) -> Self {
        mfvfs_telemetry::init_test_tracing();
        let registry = Arc::new(MutexRegistry::new());
        let prompts = Arc::new(FakePrompts::default());
        let refresher = Arc::new(FakeRefresher::default());
        let auth = Arc::new(AuthHandler::new(
            Arc::clone(&registry),
            Arc::clone(&prompts) as Arc<dyn PromptSurface>,
            Arc::clone(&refresher) as Arc<dyn ResourceRefresher>,
            Arc::new(FakeTrees(trees.clone())),
            AuthConfig::default(),
        ));
        Self {
            auth,
            registry,
            prompts,
            refresher,
            trees,
        }
    }
}

/// Poll until `check` passes or a second elapses.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
