use serde::{Deserialize, Serialize};

/// The anonymous-accessible entry route.
pub const ENTRY_ROUTE: &str = "/";

/// Where unknown paths end up.
pub const NOT_FOUND_ROUTE: &str = "/not_found";

/// Pages of the shop console, all of which require a logged-in user.
const CONSOLE_PAGES: &[(&str, &str)] = &[
    ("/games", "GameList"),
    ("/games/new", "GameNew"),
    ("/games/edit", "GameEdit"),
    ("/members", "MemberList"),
    ("/members/new", "MemberNew"),
    ("/members/edit", "MemberEdit"),
    ("/members/edit_accounts", "MemberEditAccounts"),
    ("/members/edit_sock_puppets", "MemberEditSockPuppets"),
    ("/members/edit_phones", "MemberEditPhones"),
    ("/properties", "PropertyList"),
    ("/properties/new", "PropertyNew"),
    ("/properties/details", "PropertyDetail"),
    ("/stocks", "StockList"),
    ("/stocks/new", "StockNew"),
    ("/stocks/details", "StockDetail"),
    ("/trades/new", "TradeNew"),
    ("/trades/edit", "TradeEdit"),
    ("/matches", "MatchList"),
    ("/activities", "ActivityList"),
    ("/activities/new", "ActivityNew"),
    ("/activities/edit", "ActivityEdit"),
    ("/reports", "Report"),
    ("/settings", "Setting"),
    ("/settings/communicate_way", "SettingCommunicateWay"),
    ("/settings/fee", "SettingFee"),
    ("/settings/color", "SettingColor"),
    ("/settings/online", "SettingOnline"),
    ("/settings/permission", "SettingPermission"),
    ("/settings/award", "SettingAward"),
    ("/award", "Award"),
    (NOT_FOUND_ROUTE, "NotFound"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub path: String,
    pub name: String,
    pub requires_auth: bool,
}

impl Route {
    pub fn new(path: impl Into<String>, name: impl Into<String>, requires_auth: bool) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            requires_auth,
        }
    }
}

/// The set of navigable routes plus the two special targets: the entry route
/// (redirect target for anonymous users) and an optional catch-all.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    entry: String,
    not_found: Option<String>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>, entry: impl Into<String>) -> Self {
        Self {
            routes,
            entry: entry.into(),
            not_found: None,
        }
    }

    /// Sends unknown paths to `path` instead of rejecting them.
    pub fn with_not_found(mut self, path: impl Into<String>) -> Self {
        self.not_found = Some(path.into());
        self
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn not_found(&self) -> Option<&str> {
        self.not_found.as_deref()
    }

    /// Looks up the route for `path`, ignoring any query string or fragment.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let path = strip_query(path);
        self.routes.iter().find(|route| route.path == path)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        let mut routes = vec![Route::new(ENTRY_ROUTE, "Home", false)];
        routes.extend(
            CONSOLE_PAGES
                .iter()
                .map(|(path, name)| Route::new(*path, *name, true)),
        );
        Self::new(routes, ENTRY_ROUTE).with_not_found(NOT_FOUND_ROUTE)
    }
}

pub(crate) fn strip_query(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}
