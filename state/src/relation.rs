//! Relations (integrations): regular, peer and subordinate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::RelationId;

/// A relation databag: string keys to string values.
pub type Databag = BTreeMap<String, String>;

/// Address Juju hands out in tests (RFC 5737 TEST-NET-1).
pub const DEFAULT_ADDRESS: &str = "192.0.2.0";

/// The keys Juju writes into every unit databag before charm code runs.
#[must_use]
pub fn default_unit_databag() -> Databag {
    Databag::from([
        ("egress-subnets".to_string(), format!("{DEFAULT_ADDRESS}/24")),
        ("ingress-address".to_string(), DEFAULT_ADDRESS.to_string()),
        ("private-address".to_string(), DEFAULT_ADDRESS.to_string()),
    ])
}

/// A relation between this application and a remote application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Endpoint name as declared in metadata.
    pub endpoint: String,
    /// Interface name; `None` means "whatever metadata declares".
    #[serde(default)]
    pub interface: Option<String>,
    /// Juju relation id.
    pub id: RelationId,
    /// This application's databag.
    #[serde(default)]
    pub local_app_data: Databag,
    /// This unit's databag.
    #[serde(default = "default_unit_databag")]
    pub local_unit_data: Databag,
    /// Name of the remote application.
    #[serde(default = "default_remote_app")]
    pub remote_app_name: String,
    /// The remote application's databag.
    #[serde(default)]
    pub remote_app_data: Databag,
    /// Remote unit id to databag.
    #[serde(default = "default_remote_units")]
    pub remote_units_data: BTreeMap<u32, Databag>,
}

fn default_remote_app() -> String {
    "remote".to_string()
}

fn default_remote_units() -> BTreeMap<u32, Databag> {
    BTreeMap::from([(0, default_unit_databag())])
}

impl Relation {
    /// A relation on `endpoint` with one remote unit (`remote/0`) and default databags.
    pub fn new(id: RelationId, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            interface: None,
            id,
            local_app_data: Databag::new(),
            local_unit_data: default_unit_databag(),
            remote_app_name: default_remote_app(),
            remote_app_data: Databag::new(),
            remote_units_data: default_remote_units(),
        }
    }

    /// Sets the interface name.
    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Sets the remote application name.
    #[must_use]
    pub fn with_remote_app_name(mut self, name: impl Into<String>) -> Self {
        self.remote_app_name = name.into();
        self
    }

    /// Replaces the local application databag.
    #[must_use]
    pub fn with_local_app_data<K: Into<String>, V: Into<String>>(
        mut self,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.local_app_data = collect_databag(data);
        self
    }

    /// Extends the local unit databag (defaults are kept unless overwritten).
    #[must_use]
    pub fn with_local_unit_data<K: Into<String>, V: Into<String>>(
        mut self,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.local_unit_data.extend(collect_databag(data));
        self
    }

    /// Replaces the remote application databag.
    #[must_use]
    pub fn with_remote_app_data<K: Into<String>, V: Into<String>>(
        mut self,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.remote_app_data = collect_databag(data);
        self
    }

    /// Replaces the remote units and their databags.
    #[must_use]
    pub fn with_remote_units(mut self, units: BTreeMap<u32, Databag>) -> Self {
        self.remote_units_data = units;
        self
    }
}

/// A peer relation: this application related to itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRelation {
    /// Endpoint name as declared under `peers`.
    pub endpoint: String,
    /// Interface name.
    #[serde(default)]
    pub interface: Option<String>,
    /// Juju relation id.
    pub id: RelationId,
    /// The shared application databag.
    #[serde(default)]
    pub local_app_data: Databag,
    /// This unit's databag.
    #[serde(default = "default_unit_databag")]
    pub local_unit_data: Databag,
    /// Peer unit id to databag. Never contains this unit.
    #[serde(default = "default_peers")]
    pub peers_data: BTreeMap<u32, Databag>,
}

fn default_peers() -> BTreeMap<u32, Databag> {
    BTreeMap::from([(1, default_unit_databag())])
}

impl PeerRelation {
    /// A peer relation with a single peer, unit `1`.
    pub fn new(id: RelationId, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            interface: None,
            id,
            local_app_data: Databag::new(),
            local_unit_data: default_unit_databag(),
            peers_data: default_peers(),
        }
    }

    /// Replaces the peers and their databags.
    #[must_use]
    pub fn with_peers(mut self, peers: BTreeMap<u32, Databag>) -> Self {
        self.peers_data = peers;
        self
    }

    /// Replaces the application databag.
    #[must_use]
    pub fn with_local_app_data<K: Into<String>, V: Into<String>>(
        mut self,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.local_app_data = collect_databag(data);
        self
    }
}

/// A subordinate relation: exactly one remote (principal) unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubordinateRelation {
    /// Endpoint name; must be container-scoped in metadata.
    pub endpoint: String,
    /// Interface name.
    #[serde(default)]
    pub interface: Option<String>,
    /// Juju relation id.
    pub id: RelationId,
    /// This application's databag.
    #[serde(default)]
    pub local_app_data: Databag,
    /// This unit's databag.
    #[serde(default = "default_unit_databag")]
    pub local_unit_data: Databag,
    /// Name of the principal application.
    #[serde(default = "default_remote_app")]
    pub remote_app_name: String,
    /// The principal application's databag.
    #[serde(default)]
    pub remote_app_data: Databag,
    /// Id of the principal unit.
    #[serde(default)]
    pub remote_unit_id: u32,
    /// The principal unit's databag.
    #[serde(default = "default_unit_databag")]
    pub remote_unit_data: Databag,
}

impl SubordinateRelation {
    /// A subordinate relation to `remote/0`.
    pub fn new(id: RelationId, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            interface: None,
            id,
            local_app_data: Databag::new(),
            local_unit_data: default_unit_databag(),
            remote_app_name: default_remote_app(),
            remote_app_data: Databag::new(),
            remote_unit_id: 0,
            remote_unit_data: default_unit_databag(),
        }
    }

    /// Sets the principal unit.
    #[must_use]
    pub fn with_remote_unit(mut self, id: u32, data: Databag) -> Self {
        self.remote_unit_id = id;
        self.remote_unit_data = data;
        self
    }

    /// Full name of the principal unit (`app/N`).
    #[must_use]
    pub fn remote_unit_name(&self) -> String {
        format!("{}/{}", self.remote_app_name, self.remote_unit_id)
    }
}

/// Which flavour of relation a [`AnyRelation`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Cross-application relation.
    Regular,
    /// Peer relation.
    Peer,
    /// Subordinate relation.
    Subordinate,
}

/// Any relation held in [`State::relations`](crate::State::relations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnyRelation {
    /// A regular relation.
    Regular(Relation),
    /// A peer relation.
    Peer(PeerRelation),
    /// A subordinate relation.
    Subordinate(SubordinateRelation),
}

impl From<Relation> for AnyRelation {
    fn from(r: Relation) -> Self {
        AnyRelation::Regular(r)
    }
}

impl From<PeerRelation> for AnyRelation {
    fn from(r: PeerRelation) -> Self {
        AnyRelation::Peer(r)
    }
}

impl From<SubordinateRelation> for AnyRelation {
    fn from(r: SubordinateRelation) -> Self {
        AnyRelation::Subordinate(r)
    }
}

impl AnyRelation {
    /// Relation id.
    #[must_use]
    pub fn id(&self) -> RelationId {
        match self {
            AnyRelation::Regular(r) => r.id,
            AnyRelation::Peer(r) => r.id,
            AnyRelation::Subordinate(r) => r.id,
        }
    }

    /// Endpoint name.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            AnyRelation::Regular(r) => &r.endpoint,
            AnyRelation::Peer(r) => &r.endpoint,
            AnyRelation::Subordinate(r) => &r.endpoint,
        }
    }

    /// Declared interface, if the test set one.
    #[must_use]
    pub fn interface(&self) -> Option<&str> {
        match self {
            AnyRelation::Regular(r) => r.interface.as_deref(),
            AnyRelation::Peer(r) => r.interface.as_deref(),
            AnyRelation::Subordinate(r) => r.interface.as_deref(),
        }
    }

    /// Relation flavour.
    #[must_use]
    pub fn kind(&self) -> RelationKind {
        match self {
            AnyRelation::Regular(_) => RelationKind::Regular,
            AnyRelation::Peer(_) => RelationKind::Peer,
            AnyRelation::Subordinate(_) => RelationKind::Subordinate,
        }
    }

    /// This application's databag.
    #[must_use]
    pub fn local_app_data(&self) -> &Databag {
        match self {
            AnyRelation::Regular(r) => &r.local_app_data,
            AnyRelation::Peer(r) => &r.local_app_data,
            AnyRelation::Subordinate(r) => &r.local_app_data,
        }
    }

    /// Mutable access to this application's databag.
    pub fn local_app_data_mut(&mut self) -> &mut Databag {
        match self {
            AnyRelation::Regular(r) => &mut r.local_app_data,
            AnyRelation::Peer(r) => &mut r.local_app_data,
            AnyRelation::Subordinate(r) => &mut r.local_app_data,
        }
    }

    /// This unit's databag.
    #[must_use]
    pub fn local_unit_data(&self) -> &Databag {
        match self {
            AnyRelation::Regular(r) => &r.local_unit_data,
            AnyRelation::Peer(r) => &r.local_unit_data,
            AnyRelation::Subordinate(r) => &r.local_unit_data,
        }
    }

    /// Mutable access to this unit's databag.
    pub fn local_unit_data_mut(&mut self) -> &mut Databag {
        match self {
            AnyRelation::Regular(r) => &mut r.local_unit_data,
            AnyRelation::Peer(r) => &mut r.local_unit_data,
            AnyRelation::Subordinate(r) => &mut r.local_unit_data,
        }
    }

    /// Remote application name; a peer relation's remote app is this app.
    #[must_use]
    pub fn remote_app_name<'a>(&'a self, this_app: &'a str) -> &'a str {
        match self {
            AnyRelation::Regular(r) => &r.remote_app_name,
            AnyRelation::Peer(_) => this_app,
            AnyRelation::Subordinate(r) => &r.remote_app_name,
        }
    }

    /// The remote application databag (for peers, the shared app databag).
    #[must_use]
    pub fn remote_app_data(&self) -> &Databag {
        match self {
            AnyRelation::Regular(r) => &r.remote_app_data,
            AnyRelation::Peer(r) => &r.local_app_data,
            AnyRelation::Subordinate(r) => &r.remote_app_data,
        }
    }

    /// Ids of the remote units, ascending.
    #[must_use]
    pub fn remote_unit_ids(&self) -> Vec<u32> {
        match self {
            AnyRelation::Regular(r) => r.remote_units_data.keys().copied().collect(),
            AnyRelation::Peer(r) => r.peers_data.keys().copied().collect(),
            AnyRelation::Subordinate(r) => vec![r.remote_unit_id],
        }
    }

    /// Databag of remote unit `unit_id`, if that unit is in the relation.
    #[must_use]
    pub fn remote_unit_data(&self, unit_id: u32) -> Option<&Databag> {
        match self {
            AnyRelation::Regular(r) => r.remote_units_data.get(&unit_id),
            AnyRelation::Peer(r) => r.peers_data.get(&unit_id),
            AnyRelation::Subordinate(r) => {
                (r.remote_unit_id == unit_id).then_some(&r.remote_unit_data)
            }
        }
    }
}

fn collect_databag<K: Into<String>, V: Into<String>>(
    data: impl IntoIterator<Item = (K, V)>,
) -> Databag {
    data.into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_relation_defaults() {
        let r = Relation::new(RelationId(1), "db");
        assert_eq!(r.remote_app_name, "remote");
        assert_eq!(r.remote_units_data.len(), 1);
        assert_eq!(
            r.local_unit_data.get("private-address").map(String::as_str),
            Some(DEFAULT_ADDRESS)
        );
        assert!(r.local_app_data.is_empty());
    }

    #[test]
    fn peer_remote_app_is_self() {
        let any: AnyRelation = PeerRelation::new(RelationId(2), "peers")
            .with_local_app_data([("leader", "yes")])
            .into();
        assert_eq!(any.remote_app_name("myapp"), "myapp");
        assert_eq!(any.remote_app_data().get("leader").map(String::as_str), Some("yes"));
        assert_eq!(any.remote_unit_ids(), vec![1]);
    }

    #[test]
    fn subordinate_has_exactly_one_remote_unit() {
        let any: AnyRelation = SubordinateRelation::new(RelationId(3), "juju-info")
            .with_remote_unit(4, Databag::new())
            .into();
        assert_eq!(any.remote_unit_ids(), vec![4]);
        assert!(any.remote_unit_data(4).is_some());
        assert!(any.remote_unit_data(0).is_none());
    }

    #[test]
    fn serde_keeps_the_relation_kind() {
        let any: AnyRelation = Relation::new(RelationId(5), "db").into();
        let json = serde_json::to_string(&any).unwrap();
        let back: AnyRelation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, any);
    }
}
