/// Namespace of a Kubernetes-style service host such as
/// `redis.cache.svc.cluster.local:6379` (here `cache`).
pub fn namespace_from_host(host: &str) -> Option<String> {
    let host = host.trim();
    let host = host.rsplit_once("://").map(|(_, rest)| rest).unwrap_or(host);
    let host = host.split(['/', ':']).next().unwrap_or(host);

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 3 || labels[2] != "svc" {
        return None;
    }
    let ns = labels[1];
    if ns.is_empty() {
        return None;
    }
    Some(ns.to_string())
}
