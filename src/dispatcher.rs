//! Receiver notifications to [OutputEvent]s.
use log::{debug, error, info, trace, warn};

use std::sync::Arc;

use tokio::sync::mpsc::{WeakSender, error::TrySendError};

use crate::{
    Error,
    agps::AssistanceRequest,
    controller::Controller,
    device::{DataKind, Gnss, Handler, Payload, Registration},
    event::{DataFormat, GpsData, Message, OutputEvent, ReceiverEvent},
    fix::{FixRecord, to_calendar_time},
    nmea::NmeaSentence,
    publisher::Publisher,
    runtime::Clock,
};

pub struct Dispatcher {
    /// Clock collaborator, synchronized on each valid fix
    clock: Box<dyn Clock>,

    publisher: Publisher,

    /// Publication [DataFormat]
    format: DataFormat,

    /// Active handler [Registration]
    registration: Option<Registration>,

    /// Valid fix awaiting its NMEA sentence
    fix: Option<FixRecord>,
}

impl Dispatcher {
    pub fn new(clock: Box<dyn Clock>, publisher: Publisher, format: DataFormat) -> Self {
        Self {
            clock,
            publisher,
            format,
            registration: None,
            fix: None,
        }
    }

    /// Builds the peripheral [Handler]. It only forwards notifications
    /// to the inbound queue and never blocks. A full queue is reported as
    /// an overflow, a closed queue turns the handler into a no-op.
    pub fn handler(tx: WeakSender<Message>, publisher: Publisher) -> Handler {
        Arc::new(move |event| {
            let Some(tx) = tx.upgrade() else {
                return;
            };

            match tx.try_send(Message::Receiver(event)) {
                Ok(_) => {},
                Err(TrySendError::Full(_)) => {
                    error!("{:?} - inbound queue full", event);
                    publisher.overflow();
                },
                Err(TrySendError::Closed(_)) => {},
            }
        })
    }

    /// Registers `handler` with the peripheral and keeps the [Registration].
    pub fn register<D: Gnss>(
        &mut self,
        controller: &mut Controller<D>,
        handler: Handler,
    ) -> Result<(), Error> {
        let registration = controller
            .register_handler(handler)
            .map_err(Error::Registration)?;

        debug!("receiver handler registered ({:?})", registration);
        self.registration = Some(registration);
        Ok(())
    }

    /// Releases the [Registration], if any.
    pub fn release<D: Gnss>(&mut self, controller: &mut Controller<D>) {
        if let Some(registration) = self.registration.take() {
            match controller.release_handler(registration) {
                Ok(_) => debug!("receiver handler released"),
                Err(e) => warn!("failed to release receiver handler: {}", e),
            }
        }
    }

    /// Resets per-session state
    pub fn session_started(&mut self) {
        self.fix = None;
    }

    pub fn dispatch<D: Gnss>(&mut self, event: ReceiverEvent, controller: &mut Controller<D>) {
        trace!("dispatching {:?}", event);

        match event {
            ReceiverEvent::FixReady => self.on_fix(controller),
            ReceiverEvent::SentenceReady => self.on_sentence(controller),
            ReceiverEvent::AssistanceDataNeeded => self.on_assistance(controller),
            ReceiverEvent::SignalBlocked => {
                self.publisher.publish(OutputEvent::Blocked);
            },
            ReceiverEvent::SignalUnblocked => {
                self.publisher.publish(OutputEvent::Unblocked);
            },
            ReceiverEvent::SleepAfterTimeout => {
                warn!("no fix within retry timeout");
                controller.conclude_session();
                self.fix = None;
                self.publisher.publish(OutputEvent::Inactive);
                self.publisher.publish(OutputEvent::Timeout);
            },
        }
    }

    /// Reads the payload attached to a notification.
    /// Read failures are published, kind mismatches are dropped.
    fn read<D: Gnss>(&self, controller: &mut Controller<D>, kind: DataKind) -> Option<Payload> {
        match controller.read(kind) {
            Ok(payload) => {
                debug_assert_eq!(payload.kind(), kind, "payload kind mismatch");

                if payload.kind() != kind {
                    error!("requested {:?} payload, got {:?}", kind, payload.kind());
                    return None;
                }

                Some(payload)
            },
            Err(e) => {
                error!("failed to read {:?} payload: {}", kind, e);
                self.publisher.publish(OutputEvent::Error(e.code()));
                None
            },
        }
    }

    fn on_fix<D: Gnss>(&mut self, controller: &mut Controller<D>) {
        let Some(Payload::Pvt(frame)) = self.read(controller, DataKind::Pvt) else {
            return;
        };

        let record = FixRecord::from(&frame);

        if !record.valid {
            trace!("searching: {}", record);
            self.fix = None;
            return;
        }

        match to_calendar_time(&frame.datetime) {
            Some(time) => {
                if let Err(e) = self.clock.set_time(&time) {
                    warn!("clock synchronization failed: {}", e);
                }
            },
            None => warn!("fix without valid date: clock not synchronized"),
        }

        info!("fix: {}", record);

        controller.conclude_session();
        self.publisher.publish(OutputEvent::Inactive);

        match self.format {
            DataFormat::Pvt => {
                self.fix = None;
                self.publisher
                    .publish(OutputEvent::DataReady(GpsData::Pvt(record)));
            },
            DataFormat::Nmea => {
                self.fix = Some(record);
            },
        }
    }

    fn on_sentence<D: Gnss>(&mut self, controller: &mut Controller<D>) {
        if self.format != DataFormat::Nmea {
            return;
        }

        let Some(fix) = self.fix else {
            trace!("no valid fix: sentence ignored");
            return;
        };

        let Some(Payload::Nmea(frame)) = self.read(controller, DataKind::Nmea) else {
            return;
        };

        let sentence = match NmeaSentence::try_from(&frame) {
            Ok(sentence) => sentence,
            Err(e) => {
                warn!("invalid nmea sentence: {}", e);
                return;
            },
        };

        debug!("{} - {}", sentence.sentence_type(), sentence);

        self.fix = None;

        self.publisher.publish(OutputEvent::DataReady(GpsData::Nmea {
            sentence,
            timestamp: fix.utc_timestamp,
        }));
    }

    fn on_assistance<D: Gnss>(&mut self, controller: &mut Controller<D>) {
        let Some(Payload::Agps(frame)) = self.read(controller, DataKind::Agps) else {
            return;
        };

        let request = AssistanceRequest::from(&frame);
        info!("assistance needed: {}", request);

        self.publisher.publish(OutputEvent::AssistanceNeeded(request));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use tokio::sync::mpsc;

    use crate::{
        device::{
            Datetime, DriverError, PvtFlags, PvtFrame,
            mock::{EXP_NMEA, MockClock, MockGnss, fixture_pvt},
        },
        error::NO_MESSAGE_SPACE,
        publisher,
        settings::Settings,
    };

    struct Setup {
        mock: MockGnss,
        clock: MockClock,
        controller: Controller<MockGnss>,
        dispatcher: Dispatcher,
        rx: mpsc::Receiver<OutputEvent>,
    }

    fn setup(format: DataFormat) -> Setup {
        let mock = MockGnss::with_fixtures();
        let clock = MockClock::new();
        let (publisher, rx) = publisher::channel(5);

        let controller = Controller::new(mock.clone(), &Settings::default(), publisher.clone());
        let dispatcher = Dispatcher::new(Box::new(clock.clone()), publisher, format);

        Setup {
            mock,
            clock,
            controller,
            dispatcher,
            rx,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<OutputEvent>) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_valid_fix_then_sentence() {
        let mut s = setup(DataFormat::Nmea);
        s.controller.start_session().unwrap();

        s.dispatcher
            .dispatch(ReceiverEvent::FixReady, &mut s.controller);
        s.dispatcher
            .dispatch(ReceiverEvent::SentenceReady, &mut s.controller);

        // once per fix
        s.dispatcher
            .dispatch(ReceiverEvent::SentenceReady, &mut s.controller);

        let events = drain(&mut s.rx);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], OutputEvent::Active);
        assert_eq!(events[1], OutputEvent::Inactive);

        match &events[2] {
            OutputEvent::DataReady(GpsData::Nmea {
                sentence,
                timestamp,
            }) => {
                assert_eq!(sentence.as_str(), EXP_NMEA);
                assert!(timestamp.is_some());
            },
            other => panic!("unexpected {:?}", other),
        }

        assert!(!s.controller.is_active());

        let times = s.clock.times();
        assert_eq!(times.len(), 1);
        assert_eq!(times[0].year, 121);
        assert_eq!(times[0].month, 7);
    }

    #[test]
    fn test_invalid_fix() {
        let mut s = setup(DataFormat::Nmea);
        s.mock.set_pvt(PvtFrame {
            flags: PvtFlags::DEADLINE_MISSED,
            ..fixture_pvt()
        });

        s.dispatcher
            .dispatch(ReceiverEvent::FixReady, &mut s.controller);
        s.dispatcher
            .dispatch(ReceiverEvent::SentenceReady, &mut s.controller);

        assert!(drain(&mut s.rx).is_empty());
        assert!(s.clock.times().is_empty());
    }

    #[test]
    fn test_invalid_fix_resets_pending_sentence() {
        let mut s = setup(DataFormat::Nmea);

        s.dispatcher
            .dispatch(ReceiverEvent::FixReady, &mut s.controller);

        s.mock.set_pvt(PvtFrame {
            flags: PvtFlags::empty(),
            ..fixture_pvt()
        });

        s.dispatcher
            .dispatch(ReceiverEvent::FixReady, &mut s.controller);
        s.dispatcher
            .dispatch(ReceiverEvent::SentenceReady, &mut s.controller);

        assert_eq!(drain(&mut s.rx), vec![OutputEvent::Inactive]);
    }

    #[test]
    fn test_fix_with_out_of_range_time() {
        for datetime in [
            Datetime {
                ms: 5000,
                ..fixture_pvt().datetime
            },
            Datetime {
                hour: 25,
                ..fixture_pvt().datetime
            },
        ] {
            let mut s = setup(DataFormat::Nmea);
            s.mock.set_pvt(PvtFrame {
                datetime,
                ..fixture_pvt()
            });

            s.dispatcher
                .dispatch(ReceiverEvent::FixReady, &mut s.controller);
            s.dispatcher
                .dispatch(ReceiverEvent::SentenceReady, &mut s.controller);

            let events = drain(&mut s.rx);
            assert_eq!(events.len(), 2, "{:?}", datetime);
            assert_eq!(events[0], OutputEvent::Inactive);

            match &events[1] {
                OutputEvent::DataReady(GpsData::Nmea { timestamp, .. }) => {
                    assert!(timestamp.is_none());
                },
                other => panic!("unexpected {:?}", other),
            }

            assert!(s.clock.times().is_empty());
        }
    }

    #[test]
    fn test_malformed_sentence_keeps_fix_pending() {
        let mut s = setup(DataFormat::Nmea);

        s.dispatcher
            .dispatch(ReceiverEvent::FixReady, &mut s.controller);

        s.mock.set_nmea("GPGGA,x");
        s.dispatcher
            .dispatch(ReceiverEvent::SentenceReady, &mut s.controller);

        assert_eq!(drain(&mut s.rx), vec![OutputEvent::Inactive]);

        s.mock.set_nmea(EXP_NMEA);
        s.dispatcher
            .dispatch(ReceiverEvent::SentenceReady, &mut s.controller);

        match drain(&mut s.rx).as_slice() {
            [OutputEvent::DataReady(GpsData::Nmea { sentence, .. })] => {
                assert_eq!(sentence.as_str(), EXP_NMEA);
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pvt_format() {
        let mut s = setup(DataFormat::Pvt);

        s.dispatcher
            .dispatch(ReceiverEvent::FixReady, &mut s.controller);
        s.dispatcher
            .dispatch(ReceiverEvent::SentenceReady, &mut s.controller);

        let events = drain(&mut s.rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], OutputEvent::Inactive);

        match &events[1] {
            OutputEvent::DataReady(GpsData::Pvt(record)) => {
                assert_eq!(record.latitude, 60.0);
                assert_eq!(record.longitude, 25.0);
                assert!(record.valid);
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_clock_failure_is_not_fatal() {
        let mut s = setup(DataFormat::Nmea);
        s.dispatcher = Dispatcher::new(
            Box::new(MockClock::failing()),
            s.dispatcher.publisher.clone(),
            DataFormat::Nmea,
        );

        s.dispatcher
            .dispatch(ReceiverEvent::FixReady, &mut s.controller);
        s.dispatcher
            .dispatch(ReceiverEvent::SentenceReady, &mut s.controller);

        let events = drain(&mut s.rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], OutputEvent::DataReady(_)));
    }

    #[test]
    fn test_read_failure() {
        let mut s = setup(DataFormat::Nmea);
        s.mock.fail_read(Some(DriverError::NoData));

        s.dispatcher
            .dispatch(ReceiverEvent::AssistanceDataNeeded, &mut s.controller);

        assert_eq!(drain(&mut s.rx), vec![OutputEvent::Error(-61)]);
    }

    #[test]
    fn test_timeout() {
        let mut s = setup(DataFormat::Nmea);
        s.controller.start_session().unwrap();

        s.dispatcher
            .dispatch(ReceiverEvent::SleepAfterTimeout, &mut s.controller);

        assert_eq!(
            drain(&mut s.rx),
            vec![
                OutputEvent::Active,
                OutputEvent::Inactive,
                OutputEvent::Timeout
            ]
        );
        assert!(!s.controller.is_active());
    }

    #[test]
    fn test_handler_forwarding() {
        let (publisher, mut out) = publisher::channel(5);
        let (tx, mut rx) = mpsc::channel::<Message>(2);

        let handler = Dispatcher::handler(tx.downgrade(), publisher);

        handler(ReceiverEvent::SignalBlocked);
        handler(ReceiverEvent::SignalUnblocked);

        // inbound queue full
        handler(ReceiverEvent::FixReady);
        handler(ReceiverEvent::FixReady);

        assert_eq!(
            rx.try_recv().unwrap(),
            Message::Receiver(ReceiverEvent::SignalBlocked)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Message::Receiver(ReceiverEvent::SignalUnblocked)
        );
        assert!(rx.try_recv().is_err());

        assert_eq!(out.try_recv().unwrap(), OutputEvent::Error(NO_MESSAGE_SPACE));
        assert!(out.try_recv().is_err());

        // no-op once the inbound queue is gone
        drop(rx);
        drop(tx);
        handler(ReceiverEvent::FixReady);
        assert!(out.try_recv().is_err());
    }
}
