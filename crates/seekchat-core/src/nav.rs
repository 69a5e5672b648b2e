/// A top-level screen reachable from the sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub key: &'static str,
    pub label: &'static str,
}

pub const CHAT: Route = Route {
    key: "/chat",
    label: "Chat",
};

pub const SETTINGS: Route = Route {
    key: "/settings",
    label: "Settings",
};

pub const ROUTES: [Route; 2] = [CHAT, SETTINGS];

/// The highlighted menu key for `path`: the first route whose key prefixes
/// it, otherwise the path itself.
pub fn selected_key(path: &str) -> &str {
    ROUTES
        .iter()
        .find(|route| path.starts_with(route.key))
        .map(|route| route.key)
        .unwrap_or(path)
}

/// Index of `path`'s route in [`ROUTES`], if any.
pub fn route_index(path: &str) -> Option<usize> {
    let key = selected_key(path);
    ROUTES.iter().position(|route| route.key == key)
}

/// The route after `path`'s, wrapping around. Unknown paths go to the first.
pub fn next_route(path: &str) -> Route {
    match route_index(path) {
        Some(i) => ROUTES[(i + 1) % ROUTES.len()],
        None => ROUTES[0],
    }
}
