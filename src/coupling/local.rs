//! In-process transport connecting two participants over channels.
//!
//! Each participant runs its session on its own thread and owns one end of
//! the pair. Every send is matched by exactly one receive on the partner, so
//! calls rendezvous in protocol order. No interpolation is performed: a
//! field is delivered to the partner's field with the same mesh and data
//! name, so both sides must agree on the vertex layout of exchanged meshes.
//! Mapping requests are recorded and otherwise ignored.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::coupling::transport::{
    ExportPoint, MeshPartition, PartitionRequest, StepMessage, Transport, TransportError,
};
use crate::data::field::FieldBuffer;
use crate::topology::ids::MeshId;

/// Default bound on how long a receive waits for the partner.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum Envelope {
    Partition(Vec<MeshPartition>),
    Initial { mesh: MeshId, fields: Vec<FieldBuffer> },
    Step(StepMessage),
    Closed,
}

impl Envelope {
    fn label(&self) -> &'static str {
        match self {
            Envelope::Partition(_) => "partition",
            Envelope::Initial { .. } => "initial data",
            Envelope::Step(_) => "step data",
            Envelope::Closed => "close",
        }
    }
}

/// One end of an in-process coupling channel.
#[derive(Debug)]
pub struct LocalTransport {
    name: String,
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    timeout: Duration,
    closed: bool,
    mappings: Vec<(MeshId, MeshId)>,
    exports: Vec<ExportPoint>,
}

impl LocalTransport {
    /// Connected endpoints for the participants `first` and `second`.
    pub fn pair(first: &str, second: &str) -> (LocalTransport, LocalTransport) {
        let (tx_a, rx_b) = mpsc::channel();
        let (tx_b, rx_a) = mpsc::channel();
        (
            LocalTransport::new(first, tx_a, rx_a),
            LocalTransport::new(second, tx_b, rx_b),
        )
    }

    fn new(name: &str, tx: Sender<Envelope>, rx: Receiver<Envelope>) -> Self {
        Self {
            name: name.to_owned(),
            tx,
            rx,
            timeout: DEFAULT_TIMEOUT,
            closed: false,
            mappings: Vec::new(),
            exports: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Mapping requests seen so far, in call order.
    pub fn mappings(&self) -> &[(MeshId, MeshId)] {
        &self.mappings
    }

    /// Export points signalled so far.
    pub fn exports(&self) -> &[ExportPoint] {
        &self.exports
    }

    fn open(&self) -> Result<(), TransportError> {
        if self.closed {
            Err(TransportError::new(format!("{}: transport already closed", self.name)))
        } else {
            Ok(())
        }
    }

    fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.open()?;
        let label = envelope.label();
        self.tx
            .send(envelope)
            .map_err(|_| TransportError::new(format!("{}: partner hung up before {label}", self.name)))
    }

    fn recv(&self, expected: &'static str) -> Result<Envelope, TransportError> {
        self.open()?;
        self.rx.recv_timeout(self.timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TransportError::new(format!(
                "{}: no {expected} from partner within {:?}",
                self.name, self.timeout
            )),
            RecvTimeoutError::Disconnected => {
                TransportError::new(format!("{}: partner hung up while waiting for {expected}", self.name))
            }
        })
    }

    fn unexpected(&self, expected: &str, got: &Envelope) -> TransportError {
        TransportError::new(format!(
            "{}: expected {expected}, partner sent {}",
            self.name,
            got.label()
        ))
    }
}

impl Transport for LocalTransport {
    fn establish_partition(
        &mut self,
        request: &PartitionRequest,
    ) -> Result<Vec<MeshPartition>, TransportError> {
        if request.process_count != 1 {
            return Err(TransportError::new(format!(
                "{}: local transport supports single-process participants only, got {} processes",
                self.name, request.process_count
            )));
        }
        self.send(Envelope::Partition(request.provided.clone()))?;
        let offered = match self.recv("partition")? {
            Envelope::Partition(offered) => offered,
            other => return Err(self.unexpected("partition", &other)),
        };
        request
            .received
            .iter()
            .map(|&mesh| {
                offered
                    .iter()
                    .find(|p| p.mesh == mesh)
                    .cloned()
                    .ok_or_else(|| TransportError::new(format!("{}: partner does not provide {mesh}", self.name)))
            })
            .collect()
    }

    fn exchange_initial_data(
        &mut self,
        mesh: MeshId,
        fields: Vec<FieldBuffer>,
    ) -> Result<Vec<FieldBuffer>, TransportError> {
        self.send(Envelope::Initial { mesh, fields })?;
        match self.recv("initial data")? {
            Envelope::Initial { mesh: theirs, fields } if theirs == mesh => Ok(fields),
            Envelope::Initial { mesh: theirs, .. } => Err(TransportError::new(format!(
                "{}: initial data out of order, sent {mesh}, received {theirs}",
                self.name
            ))),
            other => Err(self.unexpected("initial data", &other)),
        }
    }

    fn send_step_data(&mut self, message: StepMessage) -> Result<(), TransportError> {
        self.send(Envelope::Step(message))
    }

    fn receive_step_data(&mut self) -> Result<StepMessage, TransportError> {
        match self.recv("step data")? {
            Envelope::Step(message) => Ok(message),
            other => Err(self.unexpected("step data", &other)),
        }
    }

    fn compute_mapping(&mut self, from: MeshId, to: MeshId) -> Result<(), TransportError> {
        self.open()?;
        log::debug!("{}: mapping {from} -> {to} requested (identity)", self.name);
        self.mappings.push((from, to));
        Ok(())
    }

    fn mark_export_point(&mut self, point: &ExportPoint) -> Result<(), TransportError> {
        self.open()?;
        self.exports.push(point.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        // The partner may already be gone; closing never fails on that.
        let _ = self.tx.send(Envelope::Closed);
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn message(window: u64, value: f64) -> StepMessage {
        StepMessage {
            time_window: window,
            iteration: 1,
            fields: vec![FieldBuffer {
                mesh: MeshId::new(0),
                data: "T".into(),
                values: vec![value],
            }],
            converged: None,
        }
    }

    #[test]
    fn exchange_rendezvous_across_threads() {
        let (mut a, mut b) = LocalTransport::pair("A", "B");
        let handle = thread::spawn(move || {
            let got = b.exchange_step_data(message(1, 2.0)).unwrap();
            b.close().unwrap();
            got
        });
        let got_a = a.exchange_step_data(message(1, 1.0)).unwrap();
        let got_b = handle.join().unwrap();
        assert_eq!(got_a.fields[0].values, vec![2.0]);
        assert_eq!(got_b.fields[0].values, vec![1.0]);
        let err = a.receive_step_data().unwrap_err();
        assert!(err.0.contains("expected step data"));
    }

    #[test]
    fn receive_times_out_without_partner_activity() {
        let (a, _b) = LocalTransport::pair("A", "B");
        let mut a = a.with_timeout(Duration::from_millis(10));
        let err = a.receive_step_data().unwrap_err();
        assert!(err.0.contains("within"));
    }

    #[test]
    fn closed_transport_refuses_calls() {
        let (mut a, _b) = LocalTransport::pair("A", "B");
        a.close().unwrap();
        assert!(a.send_step_data(message(1, 0.0)).is_err());
        assert!(a.close().is_ok());
    }
}
