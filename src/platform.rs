/// Simulated infrastructure: hosts, links and disks.
///
/// The kernel only needs an opaque on/off view of each resource plus the
/// handful of static properties the resource model consumes (speed,
/// bandwidth, latency). Platforms are assembled with [`PlatformBuilder`];
/// there is no platform file format. Routing is an explicit table of
/// host pairs to link lists, filled by the builder.

use std::collections::BTreeMap;

use crate::error::KernelError;

// ── Resource identifiers ──────────────────────────────────────────────

/// Index of a host in its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct HostId(u32);

/// Index of a network link in its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkId(u32);

/// Index of a disk in its platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskId(u32);

impl HostId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl LinkId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl DiskId {
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// The kind of a resource, used to pick the failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceKind {
    Host,
    Link,
    Disk,
}

/// Any resource an activity can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceId {
    Host(HostId),
    Link(LinkId),
    Disk(DiskId),
}

impl ResourceId {
    /// The failure-kind tag of this resource.
    pub fn kind(self) -> ResourceKind {
        match self {
            ResourceId::Host(_) => ResourceKind::Host,
            ResourceId::Link(_) => ResourceKind::Link,
            ResourceId::Disk(_) => ResourceKind::Disk,
        }
    }
}

impl From<HostId> for ResourceId {
    fn from(id: HostId) -> Self {
        ResourceId::Host(id)
    }
}

impl From<LinkId> for ResourceId {
    fn from(id: LinkId) -> Self {
        ResourceId::Link(id)
    }
}

impl From<DiskId> for ResourceId {
    fn from(id: DiskId) -> Self {
        ResourceId::Disk(id)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceId::Host(h) => write!(f, "host#{}", h.0),
            ResourceId::Link(l) => write!(f, "link#{}", l.0),
            ResourceId::Disk(d) => write!(f, "disk#{}", d.0),
        }
    }
}

// ── Resource proxies ──────────────────────────────────────────────────

/// A compute host.
#[derive(Debug, Clone)]
pub struct Host {
    pub name: String,
    /// Computing speed in flop/s.
    pub speed: f64,
    pub(crate) on: bool,
}

/// A network link.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,
    /// Bandwidth in bytes/s.
    pub bandwidth: f64,
    /// Latency in seconds.
    pub latency: f64,
    pub(crate) on: bool,
}

/// A disk attached to a host.
#[derive(Debug, Clone)]
pub struct Disk {
    pub name: String,
    pub host: HostId,
    /// Read bandwidth in bytes/s.
    pub read_bandwidth: f64,
    /// Write bandwidth in bytes/s.
    pub write_bandwidth: f64,
    pub(crate) on: bool,
}

// ── Platform ──────────────────────────────────────────────────────────

/// The full set of resources of one simulation.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    hosts: Vec<Host>,
    links: Vec<Link>,
    disks: Vec<Disk>,
    routes: BTreeMap<(HostId, HostId), Vec<LinkId>>,
}

impl Platform {
    /// Look up a host by name.
    pub fn host_by_name(&self, name: &str) -> Option<HostId> {
        self.hosts
            .iter()
            .position(|h| h.name == name)
            .map(|i| HostId(i as u32))
    }

    /// Look up a link by name.
    pub fn link_by_name(&self, name: &str) -> Option<LinkId> {
        self.links
            .iter()
            .position(|l| l.name == name)
            .map(|i| LinkId(i as u32))
    }

    /// Look up a disk by name.
    pub fn disk_by_name(&self, name: &str) -> Option<DiskId> {
        self.disks
            .iter()
            .position(|d| d.name == name)
            .map(|i| DiskId(i as u32))
    }

    pub fn host(&self, id: HostId) -> Option<&Host> {
        self.hosts.get(id.0 as usize)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0 as usize)
    }

    pub fn disk(&self, id: DiskId) -> Option<&Disk> {
        self.disks.get(id.0 as usize)
    }

    /// All host ids in declaration order.
    pub fn hosts(&self) -> impl Iterator<Item = HostId> + '_ {
        (0..self.hosts.len()).map(|i| HostId(i as u32))
    }

    /// Disks attached to `host`.
    pub fn disks_of(&self, host: HostId) -> Vec<DiskId> {
        self.disks
            .iter()
            .enumerate()
            .filter(|(_, d)| d.host == host)
            .map(|(i, _)| DiskId(i as u32))
            .collect()
    }

    /// Human-readable name of any resource.
    pub fn name_of(&self, id: ResourceId) -> &str {
        let name = match id {
            ResourceId::Host(h) => self.host(h).map(|h| h.name.as_str()),
            ResourceId::Link(l) => self.link(l).map(|l| l.name.as_str()),
            ResourceId::Disk(d) => self.disk(d).map(|d| d.name.as_str()),
        };
        name.unwrap_or("<unknown>")
    }

    /// Whether `id` names a resource of this platform.
    pub fn contains(&self, id: ResourceId) -> bool {
        match id {
            ResourceId::Host(h) => self.host(h).is_some(),
            ResourceId::Link(l) => self.link(l).is_some(),
            ResourceId::Disk(d) => self.disk(d).is_some(),
        }
    }

    /// On/off state of a resource. Unknown resources are reported off.
    pub fn is_on(&self, id: ResourceId) -> bool {
        match id {
            ResourceId::Host(h) => self.host(h).is_some_and(|h| h.on),
            ResourceId::Link(l) => self.link(l).is_some_and(|l| l.on),
            ResourceId::Disk(d) => self.disk(d).is_some_and(|d| d.on),
        }
    }

    /// Flip a resource on or off. Returns `true` if the state changed.
    pub(crate) fn set_on(&mut self, id: ResourceId, on: bool) -> bool {
        let slot = match id {
            ResourceId::Host(h) => self.hosts.get_mut(h.0 as usize).map(|h| &mut h.on),
            ResourceId::Link(l) => self.links.get_mut(l.0 as usize).map(|l| &mut l.on),
            ResourceId::Disk(d) => self.disks.get_mut(d.0 as usize).map(|d| &mut d.on),
        };
        match slot {
            Some(state) if *state != on => {
                *state = on;
                true
            }
            _ => false,
        }
    }

    /// Links traversed from `src` to `dst`. Routes are symmetric and a host
    /// talking to itself uses no link. `None` if no route was declared.
    pub fn route(&self, src: HostId, dst: HostId) -> Option<&[LinkId]> {
        if src == dst {
            return Some(&[]);
        }
        self.routes
            .get(&(src, dst))
            .or_else(|| self.routes.get(&(dst, src)))
            .map(Vec::as_slice)
    }
}

// ── PlatformBuilder ───────────────────────────────────────────────────

/// Fluent builder for a [`Platform`].
///
/// # Example
/// ```rust
/// use actorsim::platform::PlatformBuilder;
///
/// let platform = PlatformBuilder::new()
///     .host("alice", 1e9)
///     .host("bob", 1e9)
///     .link("backbone", 1e8, 1e-3)
///     .route("alice", "bob", &["backbone"])
///     .disk("alice", "ssd", 5e8, 2e8)
///     .build()
///     .unwrap();
///
/// assert!(platform.host_by_name("bob").is_some());
/// let (alice, bob) = (
///     platform.host_by_name("alice").unwrap(),
///     platform.host_by_name("bob").unwrap(),
/// );
/// assert_eq!(platform.route(bob, alice).map(<[_]>::len), Some(1));
/// ```
#[derive(Debug, Default)]
pub struct PlatformBuilder {
    hosts: Vec<(String, f64)>,
    links: Vec<(String, f64, f64)>,
    disks: Vec<(String, String, f64, f64)>,
    routes: Vec<(String, String, Vec<String>)>,
}

impl PlatformBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a host with the given speed (flop/s).
    pub fn host(mut self, name: &str, speed: f64) -> Self {
        self.hosts.push((name.to_string(), speed));
        self
    }

    /// Declare a link with bandwidth (bytes/s) and latency (s).
    pub fn link(mut self, name: &str, bandwidth: f64, latency: f64) -> Self {
        self.links.push((name.to_string(), bandwidth, latency));
        self
    }

    /// Attach a disk to `host`.
    pub fn disk(mut self, host: &str, name: &str, read_bw: f64, write_bw: f64) -> Self {
        self.disks
            .push((host.to_string(), name.to_string(), read_bw, write_bw));
        self
    }

    /// Declare the (symmetric) route between two hosts.
    pub fn route(mut self, src: &str, dst: &str, links: &[&str]) -> Self {
        self.routes.push((
            src.to_string(),
            dst.to_string(),
            links.iter().map(|l| l.to_string()).collect(),
        ));
        self
    }

    /// Resolve every name and produce the platform. All resources start on.
    ///
    /// Speeds and bandwidths must be positive, latencies finite and not
    /// negative.
    pub fn build(self) -> Result<Platform, KernelError> {
        let mut platform = Platform::default();

        for (name, speed) in self.hosts {
            if platform.host_by_name(&name).is_some() {
                return Err(KernelError::DuplicateResource(name));
            }
            positive("host", &name, "speed", speed)?;
            platform.hosts.push(Host { name, speed, on: true });
        }
        for (name, bandwidth, latency) in self.links {
            if platform.link_by_name(&name).is_some() {
                return Err(KernelError::DuplicateResource(name));
            }
            positive("link", &name, "bandwidth", bandwidth)?;
            if !(latency >= 0.0 && latency.is_finite()) {
                return Err(KernelError::InvalidResource(format!(
                    "link {}: latency must be finite and not negative, got {}",
                    name, latency
                )));
            }
            platform.links.push(Link {
                name,
                bandwidth,
                latency,
                on: true,
            });
        }
        for (host, name, read_bandwidth, write_bandwidth) in self.disks {
            let host = platform
                .host_by_name(&host)
                .ok_or(KernelError::UnknownResource(host))?;
            if platform.disk_by_name(&name).is_some() {
                return Err(KernelError::DuplicateResource(name));
            }
            positive("disk", &name, "read bandwidth", read_bandwidth)?;
            positive("disk", &name, "write bandwidth", write_bandwidth)?;
            platform.disks.push(Disk {
                name,
                host,
                read_bandwidth,
                write_bandwidth,
                on: true,
            });
        }
        for (src, dst, links) in self.routes {
            let src = platform
                .host_by_name(&src)
                .ok_or(KernelError::UnknownResource(src))?;
            let dst = platform
                .host_by_name(&dst)
                .ok_or(KernelError::UnknownResource(dst))?;
            let links = links
                .into_iter()
                .map(|l| platform.link_by_name(&l).ok_or(KernelError::UnknownResource(l)))
                .collect::<Result<Vec<_>, _>>()?;
            platform.routes.insert((src, dst), links);
        }

        Ok(platform)
    }
}

fn positive(kind: &str, name: &str, what: &str, value: f64) -> Result<(), KernelError> {
    // NaN fails the comparison too.
    if value > 0.0 {
        Ok(())
    } else {
        Err(KernelError::InvalidResource(format!(
            "{} {}: {} must be positive, got {}",
            kind, name, what, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_hosts() -> Platform {
        PlatformBuilder::new()
            .host("h0", 1.0)
            .host("h1", 2.0)
            .link("l0", 10.0, 0.5)
            .route("h0", "h1", &["l0"])
            .disk("h1", "d0", 4.0, 2.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_by_name() {
        let p = two_hosts();
        let h1 = p.host_by_name("h1").unwrap();
        assert_eq!(p.host(h1).unwrap().speed, 2.0);
        assert!(p.host_by_name("nope").is_none());
        let d0 = p.disk_by_name("d0").unwrap();
        assert_eq!(p.disk(d0).unwrap().host, h1);
        assert_eq!(p.disks_of(h1), vec![d0]);
    }

    #[test]
    fn test_routes_are_symmetric() {
        let p = two_hosts();
        let h0 = p.host_by_name("h0").unwrap();
        let h1 = p.host_by_name("h1").unwrap();
        let l0 = p.link_by_name("l0").unwrap();
        assert_eq!(p.route(h0, h1), Some(&[l0][..]));
        assert_eq!(p.route(h1, h0), Some(&[l0][..]));
        assert_eq!(p.route(h0, h0), Some(&[][..]));
    }

    #[test]
    fn test_undeclared_route_is_none() {
        let p = PlatformBuilder::new()
            .host("h0", 1.0)
            .host("h1", 1.0)
            .build()
            .unwrap();
        let h0 = p.host_by_name("h0").unwrap();
        let h1 = p.host_by_name("h1").unwrap();
        assert_eq!(p.route(h0, h1), None);
    }

    #[test]
    fn test_non_positive_rates_rejected() {
        let err = PlatformBuilder::new().host("h0", 0.0).build().unwrap_err();
        assert_eq!(
            err,
            KernelError::InvalidResource("host h0: speed must be positive, got 0".into())
        );
        assert!(PlatformBuilder::new().host("h0", f64::NAN).build().is_err());
        assert!(PlatformBuilder::new()
            .link("l0", -1.0, 0.0)
            .build()
            .is_err());
        assert!(PlatformBuilder::new()
            .link("l0", 1.0, -0.5)
            .build()
            .is_err());
        assert!(PlatformBuilder::new()
            .link("l0", 1.0, f64::INFINITY)
            .build()
            .is_err());
        assert!(PlatformBuilder::new()
            .host("h0", 1.0)
            .disk("h0", "d0", 1.0, 0.0)
            .build()
            .is_err());
    }

    #[test]
    fn test_on_off() {
        let mut p = two_hosts();
        let l0: ResourceId = p.link_by_name("l0").unwrap().into();
        assert!(p.is_on(l0));
        assert!(p.set_on(l0, false));
        assert!(!p.is_on(l0));
        // Already off: no change reported.
        assert!(!p.set_on(l0, false));
        assert!(p.set_on(l0, true));
    }

    #[test]
    fn test_unknown_route_endpoint() {
        let err = PlatformBuilder::new()
            .host("h0", 1.0)
            .route("h0", "ghost", &[])
            .build()
            .unwrap_err();
        assert_eq!(err, KernelError::UnknownResource("ghost".into()));
    }

    #[test]
    fn test_duplicate_host() {
        let err = PlatformBuilder::new()
            .host("h0", 1.0)
            .host("h0", 2.0)
            .build()
            .unwrap_err();
        assert_eq!(err, KernelError::DuplicateResource("h0".into()));
    }

    #[test]
    fn test_resource_kind_and_name() {
        let p = two_hosts();
        let d: ResourceId = p.disk_by_name("d0").unwrap().into();
        assert_eq!(d.kind(), ResourceKind::Disk);
        assert_eq!(p.name_of(d), "d0");
    }
}
