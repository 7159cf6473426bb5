//! Integration tests for the Enumerator against an in-memory manager

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;

use enumctl::bus::{Arg, BusError, BusGateway, Field, MethodCall, Reply};
use enumctl::owner::OwnerLookup;
use enumctl::processes::PROCESS_SIGNATURE;
use enumctl::units::UNIT_SIGNATURE;
use enumctl::{EnumError, Enumerator, Owner, UNKNOWN_CMDLINE};

/// Manager double: canned unit list and per-unit process lists
#[derive(Default)]
struct FakeManager {
    units: Option<Vec<String>>,
    processes: HashMap<String, Result<Vec<(u32, String)>, String>>,
    /// Units answering GetUnitProcesses with a body of the wrong type
    malformed: Vec<String>,
    calls: RefCell<Vec<MethodCall>>,
}

impl FakeManager {
    fn with_units(units: &[&str]) -> Self {
        Self {
            units: Some(units.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    fn unreachable() -> Self {
        Self::default()
    }

    fn processes(mut self, unit: &str, rows: &[(u32, &str)]) -> Self {
        let rows = rows.iter().map(|(pid, cmd)| (*pid, cmd.to_string())).collect();
        self.processes.insert(unit.to_string(), Ok(rows));
        self
    }

    fn denied(mut self, unit: &str) -> Self {
        self.processes.insert(unit.to_string(), Err("Access denied".to_string()));
        self
    }

    fn malformed(mut self, unit: &str) -> Self {
        self.malformed.push(unit.to_string());
        self
    }

    fn members(&self) -> Vec<&'static str> {
        self.calls.borrow().iter().map(|c| c.member).collect()
    }
}

/// Bus object path of a unit: bytes outside `[A-Za-z0-9]` become `_xx`
fn object_path(id: &str) -> String {
    let escaped: String = id
        .bytes()
        .map(|b| match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => (b as char).to_string(),
            _ => format!("_{:02x}", b),
        })
        .collect();
    format!("/org/freedesktop/systemd1/unit/{}", escaped)
}

fn unit_row(id: &str) -> Field {
    Field::Struct(vec![
        id.into(),
        "".into(),
        "loaded".into(),
        "active".into(),
        "running".into(),
        "".into(),
        Field::object_path(object_path(id)),
        0u32.into(),
        "".into(),
        Field::object_path("/"),
    ])
}

fn process_row(unit: &str, pid: u32, cmdline: &str) -> Field {
    Field::Struct(vec![format!("/{}", unit).into(), pid.into(), cmdline.into()])
}

impl BusGateway for FakeManager {
    fn call(&self, call: &MethodCall) -> Result<Reply, BusError> {
        self.calls.borrow_mut().push(call.clone());

        let failed = |message: &str| BusError::Call {
            member: call.member.to_string(),
            message: message.to_string(),
        };

        match (call.member, call.args.as_slice()) {
            ("ListUnitsByPatterns", [Arg::StrArray(_), Arg::StrArray(_)]) => {
                let units = self.units.as_ref().ok_or_else(|| failed("Connection refused"))?;
                let rows = units.iter().map(|id| unit_row(id)).collect();
                Ok(Reply::new(vec![Field::array(UNIT_SIGNATURE, rows)]))
            }
            ("GetUnitProcesses", [Arg::Str(unit)]) if self.malformed.contains(unit) => {
                Ok(Reply::new(vec![Field::array("s", vec![unit.as_str().into()])]))
            }
            ("GetUnitProcesses", [Arg::Str(unit)]) => match self.processes.get(unit) {
                Some(Ok(rows)) => {
                    let rows = rows
                        .iter()
                        .map(|(pid, cmd)| process_row(unit, *pid, cmd))
                        .collect();
                    Ok(Reply::new(vec![Field::array(PROCESS_SIGNATURE, rows)]))
                }
                Some(Err(message)) => Err(failed(message.as_str())),
                None => Ok(Reply::new(vec![Field::array(PROCESS_SIGNATURE, vec![])])),
            },
            _ => Err(failed("Unknown method")),
        }
    }
}

/// Owner lookup answering only for known pids
#[derive(Default)]
struct Owners(HashMap<u32, u32>);

impl Owners {
    fn with(pairs: &[(u32, u32)]) -> Self {
        Self(pairs.iter().copied().collect())
    }
}

impl OwnerLookup for Owners {
    fn owner_uid(&self, pid: u32) -> io::Result<u32> {
        self.0
            .get(&pid)
            .copied()
            .ok_or_else(|| io::Error::from(io::ErrorKind::PermissionDenied))
    }
}

#[test]
fn test_single_service() {
    let manager = FakeManager::with_units(&["sshd.service"])
        .processes("sshd.service", &[(842, "/usr/sbin/sshd")]);
    let enumerator = Enumerator::new(&manager, Owners::with(&[(842, 0)]));

    let processes = enumerator.list_processes("*.service").unwrap();

    assert_eq!(processes.len(), 1);
    let sshd = &processes[0];
    assert_eq!(sshd.unit, "sshd.service");
    assert_eq!(sshd.pid, 842);
    assert_eq!(sshd.cmdline, "/usr/sbin/sshd");
    assert_eq!(sshd.control_group, "/sshd.service");
    assert_eq!(sshd.owner, Owner::Process(0));
    assert!(sshd.owner.is_resolved());
}

#[test]
fn test_request_order() {
    let manager = FakeManager::with_units(&["a.service", "b.service"]);
    let enumerator = Enumerator::new(&manager, Owners::default());

    enumerator.run("*.service").unwrap();

    assert_eq!(
        manager.members(),
        vec!["ListUnitsByPatterns", "GetUnitProcesses", "GetUnitProcesses"]
    );
    let calls = manager.calls.borrow();
    assert_eq!(
        calls[0].args,
        vec![
            Arg::StrArray(vec!["active".into()]),
            Arg::StrArray(vec!["*.service".into()]),
        ]
    );
    assert_eq!(calls[2].args, vec![Arg::Str("b.service".into())]);
}

#[test]
fn test_denied_unit_does_not_fail_pass() {
    let manager = FakeManager::with_units(&["cron.service", "apparmor.service"])
        .processes("cron.service", &[(311, "/usr/sbin/cron -f")])
        .denied("apparmor.service");
    let enumerator = Enumerator::new(&manager, Owners::with(&[(311, 0)]));

    let result = enumerator.run("*.service").unwrap();

    assert_eq!(result.units, 2);
    assert_eq!(result.processes.len(), 1);
    assert_eq!(result.processes[0].unit, "cron.service");
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].unit, "apparmor.service");
}

#[test]
fn test_unit_list_failure_is_fatal() {
    let manager = FakeManager::unreachable();
    let enumerator = Enumerator::new(&manager, Owners::default());

    let result = enumerator.list_processes("*.service");

    assert!(matches!(result, Err(EnumError::ListUnits(_))));
    assert_eq!(manager.members(), vec!["ListUnitsByPatterns"]);
}

#[test]
fn test_records_belong_to_listed_units() {
    let manager = FakeManager::with_units(&["a.service", "b.service"])
        .processes("a.service", &[(10, "a"), (11, "a-worker")])
        .processes("b.service", &[(20, "b")]);
    let enumerator = Enumerator::new(&manager, Owners::default());

    let processes = enumerator.list_processes("*.service").unwrap();

    assert_eq!(processes.len(), 3);
    assert!(processes
        .iter()
        .all(|p| p.unit == "a.service" || p.unit == "b.service"));
}

#[test]
fn test_pid_zero_and_empty_cmdline() {
    let manager = FakeManager::with_units(&["x.service"])
        .processes("x.service", &[(0, "stale"), (55, "")]);
    let enumerator = Enumerator::new(&manager, Owners::default());

    let processes = enumerator.list_processes("*").unwrap();

    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].pid, 55);
    assert_eq!(processes[0].cmdline, UNKNOWN_CMDLINE);
}

#[test]
fn test_user_slice_owner_fallback() {
    let manager = FakeManager::with_units(&["user-1000.slice", "user-0.slice"])
        .processes("user-1000.slice", &[(4000, "bash")])
        .processes("user-0.slice", &[(4100, "-zsh")]);
    // procfs hidden for every pid
    let enumerator = Enumerator::new(&manager, Owners::default());

    let processes = enumerator.list_processes("user-*.slice").unwrap();

    assert_eq!(processes[0].owner, Owner::UnitName(1000));
    assert_eq!(processes[1].owner, Owner::UnitName(0));
    assert_eq!(processes[1].owner.uid(), Some(0));
}

#[test]
fn test_unresolved_owner_still_recorded() {
    let manager = FakeManager::with_units(&["nginx.service"])
        .processes("nginx.service", &[(700, "nginx: master")]);
    let enumerator = Enumerator::new(&manager, Owners::default());

    let processes = enumerator.list_processes("*.service").unwrap();

    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].owner, Owner::Unknown);
    assert_eq!(processes[0].owner.uid(), None);
}

#[test]
fn test_many_processes_across_growth() {
    let rows: Vec<(u32, String)> = (1..=100).map(|pid| (pid, format!("worker-{}", pid))).collect();
    let rows: Vec<(u32, &str)> = rows.iter().map(|(pid, cmd)| (*pid, cmd.as_str())).collect();
    let manager = FakeManager::with_units(&["pool.service"]).processes("pool.service", &rows);
    let enumerator = Enumerator::new(&manager, Owners::default());

    let processes = enumerator.list_processes("pool.service").unwrap();

    assert_eq!(processes.len(), 100);
    assert!(processes.iter().enumerate().all(|(i, p)| p.pid == i as u32 + 1));
}

#[test]
fn test_second_pass_drops_exited_processes() {
    let first = FakeManager::with_units(&["a.service"])
        .processes("a.service", &[(10, "a"), (11, "child")]);
    let second = FakeManager::with_units(&["a.service"]).processes("a.service", &[(10, "a")]);

    let before = Enumerator::new(&first, Owners::default())
        .list_processes("*.service")
        .unwrap();
    let after = Enumerator::new(&second, Owners::default())
        .list_processes("*.service")
        .unwrap();

    assert_eq!(before.len(), 2);
    assert_eq!(after, before[..1].to_vec());
}

#[test]
fn test_no_matching_units() {
    let manager = FakeManager::with_units(&[]);
    let enumerator = Enumerator::new(&manager, Owners::default());

    let result = enumerator.run("nothing-*.service").unwrap();

    assert_eq!(result.units, 0);
    assert!(result.processes.is_empty());
    assert!(result.skipped.is_empty());
}

#[test]
fn test_unreadable_reply_skips_unit() {
    let manager = FakeManager::with_units(&["a.service", "b.service", "c.service"])
        .processes("a.service", &[(10, "a")])
        .malformed("b.service")
        .processes("c.service", &[(30, "c")]);
    let enumerator = Enumerator::new(&manager, Owners::default());

    let result = enumerator.run("*.service").unwrap();

    let pids: Vec<u32> = result.processes.iter().map(|p| p.pid).collect();
    assert_eq!(pids, vec![10, 30]);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].unit, "b.service");
    assert!(result.skipped[0].reason.starts_with("Failed to parse process list"));
}

#[test]
fn test_failed_growth_ends_pass() {
    let manager = FakeManager::with_units(&["a.service", "b.service"])
        .processes("a.service", &[(10, "a")])
        .processes("b.service", &[(20, "b")]);
    let enumerator =
        Enumerator::new(&manager, Owners::default()).with_growth_increment(usize::MAX / 2);

    let result = enumerator.run("*.service").unwrap();

    assert_eq!(result.units, 2);
    assert!(result.processes.is_empty());
    assert!(result.skipped.is_empty());
    assert_eq!(manager.members(), vec!["ListUnitsByPatterns", "GetUnitProcesses"]);
}
