use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use crossbeam::thread::scope;

/// Create and execute a worker pool.
///
/// The preprocessor feeds work items into a bounded channel that is shared by all
/// workers. Results are handed to the postprocessor in the order given by
/// `Orderable::index`, regardless of the order in which the workers finish them.
/// The postprocessor runs on the calling thread.
///
/// # Arguments
/// * `preprocessor` - Closure that pushes work items.
/// * `workers` - Closures that execute the work.
/// * `postprocessor` - Closure that consumes the ordered results.
pub(crate) fn worker_pool<Post, Pre, Workers, W, U, T>(
    preprocessor: Pre,
    workers: Workers,
    mut postprocessor: Post,
    in_capacity: usize,
    out_capacity: usize,
) -> Result<()>
where
    Post: FnMut(T) -> Result<()>,
    Pre: FnOnce(Sender<U>) -> Result<()>,
    Pre: Send,
    Workers: Iterator<Item = W>,
    W: FnOnce(Receiver<U>, Sender<T>) -> Result<()>,
    W: Send,
    T: Send + Orderable,
    U: Send,
{
    scope(|scope| -> Result<()> {
        let (in_sender, in_receiver) = bounded(in_capacity);
        let (out_sender, out_receiver) = bounded(out_capacity);

        let preprocessor = scope.spawn(move |_| {
            // the sender is dropped on return, which tells the workers that we are done
            preprocessor(in_sender)
        });

        let workers: Vec<_> = workers
            .map(|worker: W| {
                let in_receiver = in_receiver.clone();
                let out_sender = out_sender.clone();
                scope.spawn(move |_| worker(in_receiver, out_sender))
            })
            .collect();
        // only the workers hold channel ends from now on
        drop(in_receiver);
        drop(out_sender);

        let mut errors = Vec::new();

        let mut items = OrderedContainer::new();
        for item in out_receiver.iter() {
            items.insert(item);
            if errors.is_empty() {
                // Find continuous prefix, postprocess in order.
                for item in items.remove_continuous_prefix() {
                    if let Err(e) = postprocessor(item) {
                        errors.push(e);
                        break;
                    }
                }
            }
        }

        for worker in workers {
            match worker.join() {
                Ok(Err(e)) => errors.push(e),
                Err(_) => errors.push(anyhow!("bug: worker thread panicked")),
                Ok(Ok(())) => (),
            }
        }

        match preprocessor.join() {
            Ok(Err(e)) => errors.push(e),
            Err(_) => errors.push(anyhow!("bug: preprocessor thread panicked")),
            Ok(Ok(())) => (),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.remove(0))
        }
    })
    .map_err(|_| anyhow!("bug: worker pool scope panicked"))?
}

pub(crate) trait Orderable {
    fn index(&self) -> usize;
}

/// Buffers out-of-order results until the next expected index arrives.
struct OrderedContainer<T> {
    inner: BTreeMap<usize, T>,
    next_index: usize,
}

impl<T> OrderedContainer<T>
where
    T: Orderable,
{
    fn new() -> Self {
        OrderedContainer {
            inner: BTreeMap::new(),
            next_index: 0,
        }
    }

    fn insert(&mut self, value: T) {
        self.inner.insert(value.index(), value);
    }

    fn remove_continuous_prefix(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.inner.remove(&self.next_index) {
            items.push(item);
            self.next_index += 1;
        }
        items
    }
}
